use disjunctgraph::Move;

/// A candidate move together with the neighbourhood's quality estimate
/// for the solution it leads to.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveData {
    pub mv: Move,
    pub quality_estimate: f64,
}

impl MoveData {
    pub fn new(mv: Move, quality_estimate: f64) -> Self {
        MoveData {
            mv,
            quality_estimate,
        }
    }
}

/// Sorts a candidate list best-estimate-first.
pub(crate) fn sort_descending(moves: &mut [MoveData]) {
    moves.sort_by(|a, b| {
        b.quality_estimate
            .partial_cmp(&a.quality_estimate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
