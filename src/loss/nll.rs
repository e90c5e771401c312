/// Negative log-likelihood over log-softmax outputs.
pub struct NllLoss;

impl NllLoss {
    /// Scalar loss for one example: `-log_probs[target]`.
    pub fn loss(log_probs: &[f64], target: usize) -> f64 {
        -log_probs[target]
    }

    /// Gradient of the combined log-softmax + NLL w.r.t. the pre-softmax
    /// logits: `softmax(z) - onehot(target)`.
    ///
    /// This is the delta the backward pass starts from, so the log-softmax
    /// itself never needs its own Jacobian.
    pub fn logits_gradient(log_probs: &[f64], target: usize) -> Vec<f64> {
        log_probs
            .iter()
            .enumerate()
            .map(|(i, lp)| lp.exp() - if i == target { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Index of the maximum element; ties resolve to the lowest index.
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}
