//! Selection of weak categories for follow-up questioning.

/// Returns up to `limit` categories scoring below `threshold`, lowest first.
///
/// The sort is stable, so ties keep the order in which categories appear in
/// `scores`.
pub fn select_follow_up_categories<S: AsRef<str>>(
    scores: &[(S, f64)],
    threshold: f64,
    limit: usize,
) -> Vec<String> {
    let mut weak: Vec<(&str, f64)> = scores
        .iter()
        .filter(|(_, score)| *score < threshold)
        .map(|(category, score)| (category.as_ref(), *score))
        .collect();
    weak.sort_by(|a, b| a.1.total_cmp(&b.1));
    weak.into_iter()
        .take(limit)
        .map(|(category, _)| category.to_string())
        .collect()
}
