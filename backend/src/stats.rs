use shared::{Stats, TweetLabel};

/// Count per-row labels into a summary.
///
/// Rows labelled `unknown` only contribute to `total`.
pub fn aggregate<I>(labels: I) -> Stats
where
    I: IntoIterator<Item = TweetLabel>,
{
    labels.into_iter().fold(Stats::default(), |mut stats, label| {
        stats.record(label);
        stats
    })
}
