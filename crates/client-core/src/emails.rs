/// Minimal validity marker; full RFC validation is left to the service.
pub fn looks_like_email(candidate: &str) -> bool {
    candidate.contains('@')
}

/// Split free-form text (one address per line, commas accepted) into a de-duplicated,
/// order-preserving list. Entries without an `@` are dropped.
pub fn parse_email_list(text: &str) -> Vec<String> {
    dedup_emails(
        text.split(['\n', ',', ';'])
            .map(str::trim)
            .filter(|e| !e.is_empty() && looks_like_email(e)),
    )
}

pub fn dedup_emails<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for email in emails {
        let email = email.as_ref().trim();
        if email.is_empty() || out.iter().any(|e| e == email) {
            continue;
        }
        out.push(email.to_string());
    }
    out
}
