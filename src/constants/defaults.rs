use crate::models::quotes::Quote;

const DEFAULT_QUOTES: [(&str, &str); 4] = [
    (
        "The best way to get started is to quit talking and begin doing.",
        "Motivation",
    ),
    (
        "Success is not in what you have, but who you are.",
        "Inspiration",
    ),
    (
        "Your time is limited, don't waste it living someone else's life.",
        "Life",
    ),
    (
        "Push yourself, because no one else is going to do it for you.",
        "Motivation",
    ),
];

/// The dataset a fresh or unreadable store starts from.
pub fn default_quotes() -> Vec<Quote> {
    DEFAULT_QUOTES
        .iter()
        .map(|(text, category)| Quote::new(*text, *category))
        .collect()
}
