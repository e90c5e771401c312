use crate::network::classifier::ModelParameters;

/// Stochastic gradient descent with momentum.
///
/// Per buffer: `v ← μ·v + g`, then `p ← p − lr·v`. The velocity starts as
/// the first gradient seen, so the first step is plain SGD.
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: Option<ModelParameters>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64) -> Sgd {
        Sgd { learning_rate, momentum, velocity: None }
    }

    /// Applies one update to `params` given the (already averaged) gradients.
    pub fn step(&mut self, params: &mut ModelParameters, grads: &ModelParameters) {
        let (lr, momentum) = (self.learning_rate, self.momentum);
        match self.velocity.as_mut() {
            Some(v) if momentum != 0.0 => {
                for (vb, gb) in v.buffers_mut().into_iter().zip(grads.buffers()) {
                    for (vi, gi) in vb.iter_mut().zip(gb) {
                        *vi = momentum * *vi + gi;
                    }
                }
            }
            _ => self.velocity = Some(grads.clone()),
        }
        let Some(velocity) = self.velocity.as_ref() else {
            return;
        };

        for (pb, vb) in params.buffers_mut().into_iter().zip(velocity.buffers()) {
            for (pi, vi) in pb.iter_mut().zip(vb) {
                *pi -= lr * vi;
            }
        }
    }
}
