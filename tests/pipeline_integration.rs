//! End-to-end tests against the public prelude.

use blockwork::prelude::*;
use serde::Serialize;
use serde_json::json;

type Data = Vec<f64>;

fn append(a: Data, b: Data, _weight: f64) -> Data {
    [a, b].concat()
}

struct Double;

impl Block for Double {}

impl Transformer<Data> for Double {
    fn transform(&self, data: Data, _config: &Config) -> Result<Data, PipelineError> {
        Ok(data.into_iter().map(|v| v * 2.0).collect())
    }
}

struct Shift;

impl Block for Shift {}

impl Transformer<Data> for Shift {
    fn transform(&self, data: Data, config: &Config) -> Result<Data, PipelineError> {
        let by = config.get("by").and_then(JsonValue::as_f64).unwrap_or(0.0);
        Ok(data.into_iter().map(|v| v + by).collect())
    }
}

struct Passthrough;

impl Block for Passthrough {}

impl Trainer<Data> for Passthrough {
    fn train(&mut self, x: Data, y: Data, _config: &Config) -> Result<(Data, Data), PipelineError> {
        Ok((x, y))
    }

    fn predict(&self, x: Data, _config: &Config) -> Result<Data, PipelineError> {
        Ok(x)
    }
}

struct Abstract;

impl Block for Abstract {}
impl Trainer<Data> for Abstract {}

#[derive(Default, Serialize)]
struct LinearFit {
    slope: f64,
}

impl Block for LinearFit {
    fn state(&self) -> Result<String, PipelineError> {
        canonical_json(self)
    }
}

impl Trainer<Data> for LinearFit {
    fn train(&mut self, x: Data, y: Data, _config: &Config) -> Result<(Data, Data), PipelineError> {
        let xx: f64 = x.iter().map(|v| v * v).sum();
        let xy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        self.slope = if xx == 0.0 { 0.0 } else { xy / xx };
        Ok((x, y))
    }

    fn predict(&self, x: Data, _config: &Config) -> Result<Data, PipelineError> {
        Ok(x.into_iter().map(|v| v * self.slope).collect())
    }
}

struct Round;

impl Block for Round {}

impl Refiner<Data> for Round {
    fn predict(&self, y: Data) -> Result<Data, PipelineError> {
        Ok(y.into_iter().map(f64::round).collect())
    }
}

#[test]
fn test_base_trainer_is_abstract() {
    let mut system = TrainingSystem::new(vec![Step::trainer(Abstract)]).unwrap();
    match system.train(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0], &Config::new()) {
        Err(PipelineError::NotImplemented { block, method }) => {
            assert_eq!(block, "Abstract");
            assert_eq!(method, "train");
        }
        other => panic!("Expected NotImplemented, got {:?}", other),
    }
}

#[test]
fn test_parallel_training_concatenates_branches() {
    let mut system = ParallelTrainingSystem::with_concat(
        vec![Step::trainer(Passthrough), Step::trainer(Passthrough)],
        append,
    )
    .unwrap();
    let (x, y) = system
        .train(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0], &Config::new())
        .unwrap();
    assert_eq!(x, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    assert_eq!(y, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_sequential_doubles_twice() {
    let system =
        TransformingSystem::new(vec![Step::transformer(Double), Step::transformer(Double)])
            .unwrap();
    assert_eq!(
        system.transform(vec![1.0, 2.0, 3.0], &Config::new()).unwrap(),
        vec![4.0, 8.0, 12.0]
    );
}

#[test]
fn test_empty_pipeline() {
    let mut pipeline = Pipeline::<Data>::new();
    assert_eq!(
        pipeline.predict(vec![1.0, 2.0, 3.0], &Config::new()).unwrap(),
        vec![1.0, 2.0, 3.0]
    );
    assert_eq!(pipeline.compute_hash("").unwrap(), "");
    assert_eq!(pipeline.identity_hash(), "");
}

#[test]
fn test_mutated_steps_are_rejected_at_dispatch() {
    let mut transforming = TransformingSystem::new(vec![Step::transformer(Double)]).unwrap();
    transforming.steps.push(Step::trainer(Passthrough).named("intruder"));
    match transforming.transform(vec![1.0], &Config::new()) {
        Err(PipelineError::InvalidStep { system, step, .. }) => {
            assert_eq!(system, "TransformingSystem");
            assert_eq!(step, "intruder (Passthrough)");
        }
        other => panic!("Expected InvalidStep, got {:?}", other),
    }

    let mut training = TrainingSystem::new(vec![Step::trainer(Passthrough)]).unwrap();
    training.steps.push(Step::refiner(Round));
    let err = training.train(vec![1.0], vec![1.0], &Config::new()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidStep { ref step, .. } if step == "Round"));
    let err = training.predict(vec![1.0], &Config::new()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidStep { ref step, .. } if step == "Round"));

    let mut refining = RefiningSystem::new(vec![Step::refiner(Round)]).unwrap();
    refining.steps.insert(0, Step::transformer(Double));
    assert!(matches!(
        refining.predict(vec![1.4]),
        Err(PipelineError::InvalidStep { .. })
    ));
}

#[test]
fn test_full_pipeline_train_and_predict() {
    let mut pipeline = Pipeline::builder()
        .x_system(TransformingSystem::new(vec![Step::transformer(Shift).named("center")]).unwrap())
        .train_system(TrainingSystem::new(vec![Step::trainer(LinearFit::default())]).unwrap())
        .pred_system(Step::transformer(Shift))
        .build()
        .unwrap();

    let config = Config::new()
        .with(X_SYS, json!({ "center": { "by": -1.0 } }))
        .with(PRED_SYS, json!({ "by": 0.5 }));

    // x becomes [1, 2, 3], y = 2x so the fitted slope is 2.
    let (x, y) = pipeline
        .train(vec![2.0, 3.0, 4.0], vec![2.0, 4.0, 6.0], &config)
        .unwrap();
    assert_eq!(x, vec![1.5, 2.5, 3.5]);
    assert_eq!(y, vec![2.0, 4.0, 6.0]);

    assert_eq!(pipeline.predict(vec![11.0], &config).unwrap(), vec![20.5]);

    let train = pipeline.train_system.as_ref().unwrap();
    let fitted = train.children()[0].downcast_ref::<LinearFit>().unwrap();
    assert_eq!(fitted.slope, 2.0);
}

#[test]
fn test_refining_system_post_processes() {
    let system = RefiningSystem::new(vec![Step::refiner(Round)]).unwrap();
    assert_eq!(system.predict(vec![0.4, 1.6]).unwrap(), vec![0.0, 2.0]);
}

#[test]
fn test_equivalent_pipelines_share_a_hash() {
    let build = |slope: f64| {
        Pipeline::builder()
            .x_system(Step::transformer(Double))
            .train_system(Step::trainer(LinearFit { slope }))
            .build()
            .unwrap()
    };

    let mut first = build(1.0);
    let mut second = build(1.0);
    let mut third = build(3.0);

    let hash = first.compute_hash("").unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, second.compute_hash("").unwrap());
    assert_ne!(hash, third.compute_hash("").unwrap());
    assert_ne!(first.id(), second.id());
}

#[test]
fn test_training_changes_hash_only_after_recompute() {
    let mut system = TrainingSystem::new(vec![Step::trainer(LinearFit::default())]).unwrap();
    let before = system.compute_hash("").unwrap();

    system.train(vec![1.0], vec![5.0], &Config::new()).unwrap();
    assert_eq!(system.identity_hash(), before);

    let after = system.compute_hash("").unwrap();
    assert_ne!(after, before);
    assert_eq!(after, digest(r#"LinearFit({"slope":5.0})"#));
}

#[test]
fn test_labels_do_not_affect_the_hash() {
    let mut plain = TransformingSystem::new(vec![Step::transformer(Shift)]).unwrap();
    let mut labelled =
        TransformingSystem::new(vec![Step::transformer(Shift).named("offset")]).unwrap();
    assert_eq!(plain.compute_hash("").unwrap(), labelled.compute_hash("").unwrap());
}

#[test]
fn test_parallel_weights_reach_the_combiner() {
    let system = ParallelTransformingSystem::<Data>::builder()
        .step(Step::transformer(Double))
        .step(Step::transformer(Shift))
        .weights(vec![1.0, 1.0])
        .concat(|a: Data, b: Data, weight: f64| {
            a.into_iter().zip(b).map(|(a, b)| a + weight * b).collect()
        })
        .build()
        .unwrap();
    // Double seeds, Shift (by 0) is added at weight 0.5.
    assert_eq!(system.transform(vec![2.0], &Config::new()).unwrap(), vec![5.0]);
}

#[test]
fn test_save_to_html() {
    let mut pipeline = Pipeline::builder()
        .x_system(Step::transformer(Double))
        .train_system(Step::trainer(Passthrough))
        .build()
        .unwrap();
    let hash = pipeline.compute_hash("").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.html");
    pipeline.save_to_html(&path).unwrap();

    let html = std::fs::read_to_string(&path).unwrap();
    assert!(html.contains("<strong>Class:</strong> Pipeline"));
    assert!(html.contains("<strong>Class:</strong> Double"));
    assert!(html.contains("<strong>Class:</strong> Passthrough"));
    assert!(html.contains(&hash));
    assert!(html.contains(&pipeline.id().to_string()));
}

#[test]
fn test_save_to_html_reports_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("pipeline.html");
    let pipeline = Pipeline::<Data>::new();
    assert!(matches!(
        pipeline.save_to_html(&path),
        Err(PipelineError::Io { .. })
    ));
}

#[test]
fn test_repeated_calls_give_the_same_output() {
    let config = Config::new().with("Shift", json!({ "by": 1.5 }));
    let input = vec![1.0, -2.0, 3.0];

    let sequential =
        TransformingSystem::new(vec![Step::transformer(Double), Step::transformer(Shift)])
            .unwrap();
    let first = sequential.transform(input.clone(), &config).unwrap();
    assert_eq!(first, sequential.transform(input.clone(), &config).unwrap());

    let parallel = ParallelTransformingSystem::with_concat(
        vec![Step::transformer(Shift), Step::transformer(Double)],
        append,
    )
    .unwrap();
    let first = parallel.transform(input.clone(), &config).unwrap();
    assert_eq!(first, parallel.transform(input.clone(), &config).unwrap());

    let mut training = TrainingSystem::new(vec![Step::trainer(LinearFit::default())]).unwrap();
    training.train(vec![1.0, 2.0], vec![3.0, 6.0], &Config::new()).unwrap();
    let first = training.predict(input.clone(), &Config::new()).unwrap();
    assert_eq!(first, training.predict(input.clone(), &Config::new()).unwrap());

    let mut pipeline = Pipeline::builder()
        .x_system(TransformingSystem::new(vec![Step::transformer(Shift)]).unwrap())
        .train_system(Step::trainer(LinearFit::default()))
        .pred_system(Step::transformer(Double))
        .build()
        .unwrap();
    let stages = Config::new().with(X_SYS, config.clone().into_value());
    pipeline.train(vec![1.0, 2.0], vec![5.0, 7.0], &stages).unwrap();
    let first = pipeline.predict(input.clone(), &stages).unwrap();
    assert_eq!(first, pipeline.predict(input, &stages).unwrap());
}
