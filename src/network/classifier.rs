use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::{log_softmax, relu_backward_in_place, relu_in_place};
use crate::error::{Error, Result};
use crate::layers::{conv::Conv2d, dense::Dense, pool::MaxPool2d};
use crate::loss::nll::NllLoss;
use crate::math::tensor::Tensor;
use crate::network::spec::{
    ClassifierSpec, CONV_A_CHANNELS, CONV_B_CHANNELS, HIDDEN_UNITS, INPUT_CHANNELS, KERNEL_SIZE,
    POOL_WINDOW,
};

/// Every learnable tensor of the classifier.
///
/// Also used as the gradient accumulator during training: a zeroed copy of
/// the parameters has exactly the right shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub conv_a: Conv2d,
    pub conv_b: Conv2d,
    pub fc1: Dense,
    pub fc2: Dense,
}

impl ModelParameters {
    pub fn init<R: Rng + ?Sized>(spec: &ClassifierSpec, rng: &mut R) -> Result<ModelParameters> {
        let flattened = spec.flattened_len()?;
        Ok(ModelParameters {
            conv_a: Conv2d::he(INPUT_CHANNELS, CONV_A_CHANNELS, KERNEL_SIZE, rng),
            conv_b: Conv2d::he(CONV_A_CHANNELS, CONV_B_CHANNELS, KERNEL_SIZE, rng),
            fc1: Dense::he(flattened, HIDDEN_UNITS, rng),
            fc2: Dense::xavier(HIDDEN_UNITS, spec.num_classes, rng),
        })
    }

    pub fn zeros_like(&self) -> ModelParameters {
        ModelParameters {
            conv_a: self.conv_a.zeros_like(),
            conv_b: self.conv_b.zeros_like(),
            fc1: self.fc1.zeros_like(),
            fc2: self.fc2.zeros_like(),
        }
    }

    /// Width of the output layer.
    pub fn num_classes(&self) -> usize {
        self.fc2.out_features
    }

    /// All parameter buffers in a fixed order.
    pub fn buffers(&self) -> [&[f64]; 8] {
        [
            &self.conv_a.weights.data[..],
            &self.conv_a.biases[..],
            &self.conv_b.weights.data[..],
            &self.conv_b.biases[..],
            &self.fc1.weights.data[..],
            &self.fc1.biases[..],
            &self.fc2.weights.data[..],
            &self.fc2.biases[..],
        ]
    }

    /// Mutable view of [`ModelParameters::buffers`], same order.
    pub fn buffers_mut(&mut self) -> [&mut [f64]; 8] {
        [
            &mut self.conv_a.weights.data[..],
            &mut self.conv_a.biases[..],
            &mut self.conv_b.weights.data[..],
            &mut self.conv_b.biases[..],
            &mut self.fc1.weights.data[..],
            &mut self.fc1.biases[..],
            &mut self.fc2.weights.data[..],
            &mut self.fc2.biases[..],
        ]
    }

    pub fn scale(&mut self, factor: f64) {
        for buf in self.buffers_mut() {
            buf.iter_mut().for_each(|v| *v *= factor);
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.buffers().iter().map(|b| b.len()).sum()
    }

    /// Checks every tensor against the shapes `spec` implies.
    ///
    /// The output width is checked first so that a checkpoint built for a
    /// different class count reports that, rather than some inner tensor.
    pub fn validate(&self, spec: &ClassifierSpec) -> Result<()> {
        let flattened = spec.flattened_len()?;
        let k2 = KERNEL_SIZE * KERNEL_SIZE;
        let expect = |what: &'static str, expected: usize, found: usize| {
            if expected == found {
                Ok(())
            } else {
                Err(Error::shape(what, expected, found))
            }
        };

        expect("output layer width", spec.num_classes, self.fc2.out_features)?;
        expect("output layer weights", spec.num_classes * HIDDEN_UNITS, self.fc2.weights.data.len())?;
        expect("output layer biases", spec.num_classes, self.fc2.biases.len())?;
        expect("output layer fan-in", HIDDEN_UNITS, self.fc2.in_features)?;
        expect("hidden layer width", HIDDEN_UNITS, self.fc1.out_features)?;
        expect("hidden layer fan-in", flattened, self.fc1.in_features)?;
        expect("hidden layer weights", flattened * HIDDEN_UNITS, self.fc1.weights.data.len())?;
        expect("hidden layer biases", HIDDEN_UNITS, self.fc1.biases.len())?;
        expect("convolution A kernel size", KERNEL_SIZE, self.conv_a.kernel_size)?;
        expect("convolution A input channels", INPUT_CHANNELS, self.conv_a.in_channels)?;
        expect("convolution A output channels", CONV_A_CHANNELS, self.conv_a.out_channels)?;
        expect("convolution A weights", CONV_A_CHANNELS * INPUT_CHANNELS * k2, self.conv_a.weights.data.len())?;
        expect("convolution A biases", CONV_A_CHANNELS, self.conv_a.biases.len())?;
        expect("convolution B kernel size", KERNEL_SIZE, self.conv_b.kernel_size)?;
        expect("convolution B input channels", CONV_A_CHANNELS, self.conv_b.in_channels)?;
        expect("convolution B output channels", CONV_B_CHANNELS, self.conv_b.out_channels)?;
        expect("convolution B weights", CONV_B_CHANNELS * CONV_A_CHANNELS * k2, self.conv_b.weights.data.len())?;
        expect("convolution B biases", CONV_B_CHANNELS, self.conv_b.biases.len())?;
        Ok(())
    }
}

/// Intermediate activations of one forward pass, kept for backprop.
pub struct ForwardTrace<'a> {
    input: &'a Tensor,
    conv_a: Tensor,
    pooled_a: Tensor,
    switches_a: Vec<usize>,
    conv_b: Tensor,
    pooled_b: Tensor,
    switches_b: Vec<usize>,
    hidden: Vec<f64>,
    pub log_probs: Vec<f64>,
}

/// The kanji classifier: two conv/ReLU/pool stages, two dense layers and a
/// log-softmax head.
///
/// Forward passes only borrow `&self`, so a loaded classifier can be shared
/// across threads for inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    spec: ClassifierSpec,
    params: ModelParameters,
    pool: MaxPool2d,
}

impl Classifier {
    /// Freshly initialised classifier for `spec`.
    pub fn new<R: Rng + ?Sized>(spec: ClassifierSpec, rng: &mut R) -> Result<Classifier> {
        let params = ModelParameters::init(&spec, rng)?;
        Ok(Classifier { spec, params, pool: MaxPool2d::new(POOL_WINDOW) })
    }

    /// Wraps existing parameters, failing with a shape mismatch if they do
    /// not fit `spec`.
    pub fn from_parameters(spec: ClassifierSpec, params: ModelParameters) -> Result<Classifier> {
        params.validate(&spec)?;
        Ok(Classifier { spec, params, pool: MaxPool2d::new(POOL_WINDOW) })
    }

    pub fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }

    pub fn num_classes(&self) -> usize {
        self.spec.num_classes
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn parameters_mut(&mut self) -> &mut ModelParameters {
        &mut self.params
    }

    fn check_input(&self, input: &Tensor) -> Result<()> {
        if input.channels != INPUT_CHANNELS {
            return Err(Error::shape("input channels", INPUT_CHANNELS, input.channels));
        }
        if input.height != self.spec.height {
            return Err(Error::shape("input height", self.spec.height, input.height));
        }
        if input.width != self.spec.width {
            return Err(Error::shape("input width", self.spec.width, input.width));
        }
        Ok(())
    }

    /// Class log-probabilities for one `3 × H × W` image in `[0, 1]`.
    pub fn forward(&self, input: &Tensor) -> Result<Vec<f64>> {
        Ok(self.forward_trace(input)?.log_probs)
    }

    /// Forward pass that keeps every intermediate needed by [`Classifier::backward`].
    pub fn forward_trace<'a>(&self, input: &'a Tensor) -> Result<ForwardTrace<'a>> {
        self.check_input(input)?;
        let p = &self.params;

        let mut conv_a = p.conv_a.forward(input);
        relu_in_place(&mut conv_a.data);
        let (pooled_a, switches_a) = self.pool.forward(&conv_a);

        let mut conv_b = p.conv_b.forward(&pooled_a);
        relu_in_place(&mut conv_b.data);
        let (pooled_b, switches_b) = self.pool.forward(&conv_b);

        // Channel-first buffer is already the flattened (c, y, x) order.
        let mut hidden = p.fc1.forward(&pooled_b.data);
        relu_in_place(&mut hidden);
        let logits = p.fc2.forward(&hidden);
        let log_probs = log_softmax(&logits);

        Ok(ForwardTrace {
            input,
            conv_a,
            pooled_a,
            switches_a,
            conv_b,
            pooled_b,
            switches_b,
            hidden,
            log_probs,
        })
    }

    /// Backpropagates the NLL loss of `trace` against `target` and adds the
    /// parameter gradients into `grads`. Returns the example's loss.
    pub fn backward(&self, trace: &ForwardTrace<'_>, target: usize, grads: &mut ModelParameters) -> Result<f64> {
        if target >= self.spec.num_classes {
            return Err(Error::shape("target class id", self.spec.num_classes, target));
        }
        let p = &self.params;
        let loss = NllLoss::loss(&trace.log_probs, target);

        let grad_logits = NllLoss::logits_gradient(&trace.log_probs, target);
        let mut grad_hidden = p.fc2.backward(&trace.hidden, &grad_logits, &mut grads.fc2);
        relu_backward_in_place(&mut grad_hidden, &trace.hidden);
        let grad_flat = p.fc1.backward(&trace.pooled_b.data, &grad_hidden, &mut grads.fc1);

        let (c, h, w) = trace.pooled_b.shape();
        let grad_pooled_b = Tensor::from_vec(c, h, w, grad_flat)?;
        let mut grad_conv_b = self.pool.backward(trace.conv_b.shape(), &trace.switches_b, &grad_pooled_b);
        relu_backward_in_place(&mut grad_conv_b.data, &trace.conv_b.data);
        let grad_pooled_a = p.conv_b.backward(&trace.pooled_a, &grad_conv_b, &mut grads.conv_b);

        let mut grad_conv_a = self.pool.backward(trace.conv_a.shape(), &trace.switches_a, &grad_pooled_a);
        relu_backward_in_place(&mut grad_conv_a.data, &trace.conv_a.data);
        p.conv_a.backward_weights(trace.input, &grad_conv_a, &mut grads.conv_a);

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rand::{rngs::StdRng, SeedableRng};

    fn image(spec: &ClassifierSpec, seed: u64) -> Tensor {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..INPUT_CHANNELS * spec.height * spec.width).map(|_| rng.gen::<f64>()).collect();
        Tensor::from_vec(INPUT_CHANNELS, spec.height, spec.width, data).unwrap()
    }

    #[test]
    fn output_is_a_log_distribution_over_all_classes() {
        let spec = ClassifierSpec::new(28, 28, 7).unwrap();
        let model = Classifier::new(spec, &mut StdRng::seed_from_u64(1)).unwrap();
        let out = model.forward(&image(&spec, 2)).unwrap();

        assert_eq!(out.len(), 7);
        assert!(out.iter().all(|&v| v <= 0.0));
        let total: f64 = out.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9, "sum of probabilities was {total}");
    }

    #[test]
    fn wrong_input_shape_is_an_error_not_a_panic() {
        let spec = ClassifierSpec::new(16, 16, 3).unwrap();
        let model = Classifier::new(spec, &mut StdRng::seed_from_u64(1)).unwrap();

        let grey = Tensor::zeros(1, 16, 16);
        assert_eq!(model.forward(&grey).unwrap_err().kind(), ErrorKind::ShapeMismatch);
        let big = Tensor::zeros(3, 28, 28);
        assert_eq!(model.forward(&big).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn parameters_for_another_class_count_are_rejected() {
        let ten = ClassifierSpec::new(16, 16, 10).unwrap();
        let params = ModelParameters::init(&ten, &mut StdRng::seed_from_u64(3)).unwrap();
        let twelve = ClassifierSpec { num_classes: 12, ..ten };

        match Classifier::from_parameters(twelve, params) {
            Err(Error::ShapeMismatch { expected, found, .. }) => {
                assert_eq!((expected, found), (12, 10));
            }
            other => panic!("expected a shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn backward_matches_finite_differences() {
        let spec = ClassifierSpec::new(16, 16, 3).unwrap();
        let mut model = Classifier::new(spec, &mut StdRng::seed_from_u64(11)).unwrap();
        let input = image(&spec, 12);
        let target = 1;

        let mut grads = model.parameters().zeros_like();
        {
            let trace = model.forward_trace(&input).unwrap();
            model.backward(&trace, target, &mut grads).unwrap();
        }

        let loss_at = |m: &Classifier| NllLoss::loss(&m.forward(&input).unwrap(), target);
        let eps = 1e-5;
        // Probe a few coordinates of every buffer, including the first conv.
        for buf in 0..8 {
            let len = grads.buffers()[buf].len();
            for &i in &[0, len / 3, len - 1] {
                let analytic = grads.buffers()[buf][i];
                let original = model.parameters().buffers()[buf][i];

                model.parameters_mut().buffers_mut()[buf][i] = original + eps;
                let plus = loss_at(&model);
                model.parameters_mut().buffers_mut()[buf][i] = original - eps;
                let minus = loss_at(&model);
                model.parameters_mut().buffers_mut()[buf][i] = original;

                let numeric = (plus - minus) / (2.0 * eps);
                let tol = 1e-6 + 1e-4 * numeric.abs().max(analytic.abs());
                assert!(
                    (numeric - analytic).abs() < tol,
                    "buffer {buf} index {i}: numeric {numeric} vs analytic {analytic}"
                );
            }
        }
    }
}
