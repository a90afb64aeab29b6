/// `true` for `<digits>/<digits>` and nothing else, e.g. `12/2024`.
pub fn is_report_identifier(text: &str) -> bool {
    let Some((left, right)) = text.split_once('/') else {
        return false;
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    all_digits(left) && all_digits(right)
}

/// Report identifiers found in table-cell texts, in page order.
pub fn extract_identifiers<I, T>(cells: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    cells
        .into_iter()
        .filter_map(|cell| {
            let trimmed = cell.as_ref().trim();
            is_report_identifier(trimmed).then(|| trimmed.to_string())
        })
        .collect()
}
