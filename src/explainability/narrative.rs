//! Plain-language reasons for individual tokens

const SPAM_INDICATORS: &[(&str, &str)] = &[
    ("free", "'Free' offers are common in promotional spam"),
    ("win", "Claims of winning something are typical spam tactics"),
    ("winner", "Telling the reader they are a winner is a classic spam hook"),
    ("urgent", "Urgency is used to pressure recipients into acting quickly"),
    ("click", "Requests to click links often lead to phishing or spam sites"),
    ("now", "Demands for immediate action are a spam pressure tactic"),
    ("limited", "Limited-time wording creates artificial scarcity"),
    ("offer", "Unsolicited offers are a hallmark of promotional spam"),
    ("prize", "Prize announcements are frequent in lottery and reward scams"),
    ("money", "Mentions of money are common in financial scams"),
    ("cash", "Cash rewards are a frequent lure in spam messages"),
    ("congratulations", "Unexpected congratulations usually precede a scam pitch"),
    ("call", "Requests to call a number are common in premium-rate spam"),
    ("text", "Requests to text a short code are common in subscription spam"),
    ("stop", "Opt-out instructions appear mostly in bulk marketing messages"),
    ("reply", "Requests to reply are used to confirm active numbers"),
];

const HAM_INDICATORS: &[(&str, &str)] = &[
    ("meeting", "Meeting references suggest personal or work correspondence"),
    ("thanks", "Expressions of gratitude are typical of personal messages"),
    ("please", "Polite requests are more common in legitimate messages"),
    ("time", "Time coordination is typical of everyday conversation"),
    ("today", "Day-to-day planning suggests a personal message"),
    ("tomorrow", "Making plans for tomorrow suggests a personal message"),
    ("work", "Work references suggest professional correspondence"),
    ("home", "Talk of home suggests a personal message"),
    ("family", "Family references are typical of personal messages"),
    ("friend", "Mentions of friends suggest a personal message"),
    ("love", "Affectionate language is common between people who know each other"),
    ("sorry", "Apologies are typical of genuine conversation"),
    ("help", "Requests for help are common in personal messages"),
];

fn lookup(table: &'static [(&'static str, &'static str)], token: &str) -> Option<&'static str> {
    table.iter().find(|(word, _)| *word == token).map(|(_, text)| *text)
}

/// Indicator whose word appears inside the token, or the other way round
fn partial(table: &'static [(&'static str, &'static str)], token: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(word, _)| token.contains(word) || (token.len() >= 3 && word.contains(token)))
        .map(|(_, text)| *text)
}

/// Describe why `token` carries `weight` toward spam (positive) or ham
pub fn describe_feature(token: &str, weight: f64) -> String {
    let table = if weight > 0.0 {
        SPAM_INDICATORS
    } else {
        HAM_INDICATORS
    };

    if let Some(text) = lookup(table, token) {
        return text.to_string();
    }
    if token.contains(' ') {
        return format!("The phrase '{}' was identified as significant by the model", token);
    }
    if let Some(text) = partial(table, token) {
        return text.to_string();
    }

    if token.starts_with("http") || token.starts_with("www") {
        return "URLs in messages can indicate spam or phishing attempts".to_string();
    }
    let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
    if digits >= 3 {
        return "Phone numbers or codes are common in spam messages".to_string();
    }
    if digits > 0 {
        return "Numeric content was flagged as relevant to the prediction".to_string();
    }
    if token.chars().any(|c| matches!(c, '!' | '$' | '%' | '*')) {
        return "Special characters are often used to attract attention in spam".to_string();
    }

    let side = if weight > 0.0 { "spam" } else { "legitimate" };
    format!("The model associates '{}' with {} messages", token, side)
}
