use obe_core::{
    CandidateSetting, ModelFunction, ObeError, Prediction, RngHandle, SettingSelector,
};

struct Line {
    slope: f64,
}

impl ModelFunction for Line {
    fn parameter_dim(&self) -> usize {
        1
    }

    fn setting_dim(&self) -> usize {
        1
    }

    fn constants(&self) -> Vec<f64> {
        vec![self.slope]
    }

    fn predict(&self, parameters: &[f64], setting: &[f64]) -> Result<Prediction, ObeError> {
        Ok(Prediction::scalar(parameters[0] + self.slope * setting[0]))
    }
}

#[derive(Debug)]
struct First;

impl SettingSelector for First {
    fn name(&self) -> &str {
        "first"
    }

    fn select(&self, _utilities: &[f64], _rng: &mut RngHandle) -> Result<usize, ObeError> {
        Ok(0)
    }
}

#[test]
fn trait_objects_are_object_safe() {
    let model: Box<dyn ModelFunction> = Box::new(Line { slope: 2.0 });
    let selector: Box<dyn SettingSelector> = Box::new(First);

    assert_eq!(model.name(), "model");
    assert_eq!(model.observable_dim(), 1);
    assert_eq!(model.constants(), vec![2.0]);

    let mut rng = RngHandle::from_seed(1);
    assert_eq!(selector.select(&[0.1, 0.2], &mut rng).unwrap(), 0);
}

#[test]
fn default_batch_is_particle_major() {
    let model = Line { slope: 2.0 };
    let particles = vec![vec![0.0], vec![1.0]];
    let settings = vec![
        CandidateSetting::new(vec![0.0]),
        CandidateSetting::new(vec![1.0]),
        CandidateSetting::new(vec![2.0]),
    ];
    let batch = model.predict_batch(&particles, &settings).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].len(), 3);
    assert_eq!(batch[1][2], Prediction::scalar(5.0));
}
