/// Element-wise ReLU applied in place.
pub fn relu_in_place(values: &mut [f64]) {
    for v in values.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

/// Gates `grad` by the ReLU derivative, using the *post*-activation values.
///
/// `activated[i] > 0` exactly when the pre-activation was positive, so the
/// forward output is enough to backpropagate and nothing else needs caching.
pub fn relu_backward_in_place(grad: &mut [f64], activated: &[f64]) {
    debug_assert_eq!(grad.len(), activated.len());
    for (g, &a) in grad.iter_mut().zip(activated) {
        if a <= 0.0 {
            *g = 0.0;
        }
    }
}

/// Numerically stable log-softmax: `x_i - max - ln(sum(exp(x_j - max)))`.
pub fn log_softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = logits.iter().map(|&x| (x - max).exp()).sum::<f64>().ln();
    logits.iter().map(|&x| x - max - log_sum).collect()
}
