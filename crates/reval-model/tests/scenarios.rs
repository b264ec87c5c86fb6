//! End-to-end validation runs against a [`Model`].

use std::time::Duration;

use futures_util::FutureExt;
use reval_model::{Model, ModelConfig, ModelError, ModelEvent, State, Status, ValidateOptions};
use reval_schema::{Check, CompileError, Compiler, Keyword, Outcome, Registry, Site};
use serde_json::{json, Map, Value};

fn model(schema: Value, data: Value) -> Model {
    Model::new(&schema, Some(data)).unwrap()
}

/// Sleeps for `value` milliseconds, then requires `value < 50`.
struct Delay;

impl Keyword for Delay {
    fn name(&self) -> &str {
        "delay"
    }

    fn compile(&self, _site: &Site<'_>, _payload: &Value) -> Result<Check, CompileError> {
        Ok(Check::leaf(|cursor| {
            async move {
                let ms = cursor.value().and_then(|v| v.as_u64()).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(Outcome::check(ms < 50, || "too slow".to_string()))
            }
            .boxed()
        }))
    }
}

/// Always fails to produce an outcome, like an unreachable resolver.
struct Lookup;

impl Keyword for Lookup {
    fn name(&self) -> &str {
        "lookup"
    }

    fn compile(&self, _site: &Site<'_>, _payload: &Value) -> Result<Check, CompileError> {
        Ok(Check::leaf(|cursor| {
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Err(cursor.failure("lookup", "resolver unavailable"))
            }
            .boxed()
        }))
    }
}

fn custom_model(schema: Value, data: Value) -> Model {
    let mut registry = Registry::with_builtins();
    registry.register(Delay);
    registry.register(Lookup);
    Model::compile(&Compiler::new(registry), &schema, Some(data), ModelConfig::default()).unwrap()
}

#[tokio::test]
async fn default_is_committed_on_undefined_root() {
    let model = Model::new(&json!({"type": "number", "default": 123}), None).unwrap();
    assert!(model.validate(ValidateOptions::default()).await.unwrap());
    assert_eq!(model.root().status(), Status::Success);
    assert_eq!(model.value(), Some(json!(123)));
}

#[tokio::test]
async fn first_error_is_deepest_earliest_commit() {
    let model = model(
        json!({"properties": {"car": {"properties": {"a": {"type": "number"}}}}}),
        json!({"car": {"a": false}, "foo": false, "bar": {"b": false}}),
    );
    assert!(!model.validate(ValidateOptions::default()).await.unwrap());
    let first = model.root().first_error().unwrap();
    assert_eq!(first.path(), "/car/a");
    assert_eq!(first.message().as_deref(), Some("must be of type number"));

    let errors: Vec<String> = model
        .root()
        .errors()
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(errors, vec!["/car/a", "/car", "/"]);
}

#[tokio::test]
async fn only_dirty_refs_commits_explicitly_set_fields() {
    let model = model(
        json!({
            "properties": {
                "x": {"maximum": 5},
                "y": {"maximum": 5},
                "z": {"maximum": 5}
            }
        }),
        json!({"x": 6, "y": 7, "z": 8}),
    );
    let options = ValidateOptions::new().only_dirty_refs(true);

    assert!(!model.validate(options.clone()).await.unwrap());
    assert!(model.root().first_error().is_none());
    for path in ["/x", "/y", "/z"] {
        assert!(model.reference(path).pristine(), "{path} should be pristine");
    }

    model.reference("/x").set_value(Some(json!(3))).unwrap();
    assert!(!model.validate(options).await.unwrap());
    assert_eq!(model.reference("/x").status(), Status::Success);
    assert!(model.reference("/x").validated());
    assert!(model.reference("/y").pristine());
    assert!(model.reference("/z").pristine());
    assert!(!model.reference("/y").validated());
}

#[tokio::test]
async fn all_of_bounds_commit() {
    let schema = json!({"allOf": [{"maximum": 5}, {"minimum": 3}]});
    for (value, status) in [
        (json!(3), Status::Success),
        (json!(1), Status::Error),
        (json!("x"), Status::Error),
    ] {
        let model = model(schema.clone(), value.clone());
        model.validate(ValidateOptions::default()).await.unwrap();
        assert_eq!(model.root().status(), status, "value {value}");
    }
}

#[tokio::test]
async fn presence_check_trims_stored_value() {
    let model = model(
        json!({"properties": {"name": {"required": true}}}),
        json!({"name": "  foo "}),
    );
    assert!(model.validate(ValidateOptions::default()).await.unwrap());
    let name = model.reference("/name");
    assert_eq!(name.status(), Status::Success);
    assert!(name.required());
    assert_eq!(name.value(), Some(json!("foo")));
    assert!(name.changed());
    assert!(!name.dirty());
}

#[tokio::test]
async fn required_list_flags_children() {
    let model = model(
        json!({"properties": {"a": {}, "b": {}}, "required": ["a"]}),
        json!({"b": 1}),
    );
    assert!(!model.validate(ValidateOptions::default()).await.unwrap());
    assert!(model.reference("/a").required());
    assert!(!model.reference("/b").required());
    assert_eq!(
        model.root().message().as_deref(),
        Some("missing required property 'a'")
    );
}

#[tokio::test]
async fn newer_run_wins_over_late_older_run() {
    let model = custom_model(json!({"delay": true}), json!(100));
    let root = model.root();

    let older = root.validate(ValidateOptions::default());
    let newer = async {
        root.set_value(Some(json!(10))).unwrap();
        root.validate(ValidateOptions::default()).await
    };
    let (older, newer) = tokio::join!(older, newer);

    assert!(newer.unwrap());
    // The older run computed "invalid" but its commit was superseded.
    assert!(older.unwrap());
    let state = root.state();
    assert_eq!(state.status, Status::Success);
    assert_eq!(state.val_lock, 2);
    assert_eq!(state.err_lock, None);
}

#[tokio::test]
async fn late_older_run_keeps_newer_branch_records() {
    let model = custom_model(
        json!({
            "properties": {"kind": {"type": "string"}},
            "if": {"properties": {"kind": {"const": "car"}}},
            "then": {"properties": {"wheels": {"minimum": 3}}},
            "else": {"properties": {"legs": {"delay": true}}}
        }),
        json!({"kind": "bike", "legs": 60}),
    );
    let root = model.root();

    let older = root.validate(ValidateOptions::default());
    let newer = async {
        root.set_value(Some(json!({"kind": "car", "wheels": 1})))
            .unwrap();
        root.validate(ValidateOptions::default()).await
    };
    let (older, newer) = tokio::join!(older, newer);

    assert!(!newer.unwrap());
    assert!(!older.unwrap());
    assert_eq!(model.paths(), vec!["/", "/kind", "/wheels"]);
    let wheels = model.reference("/wheels").state();
    assert_eq!(wheels.status, Status::Error);
    assert_eq!(wheels.val_lock, 2);
    assert_eq!(model.root().state().val_lock, 2);
    assert!(model.reference("/legs").pristine());
}

#[tokio::test]
async fn first_error_follows_commit_order_not_latency() {
    let model = custom_model(
        json!({
            "properties": {
                "slow": {"delay": true},
                "fast": {"maximum": 1}
            }
        }),
        json!({"slow": 60, "fast": 2}),
    );
    assert!(!model.validate(ValidateOptions::default()).await.unwrap());
    assert_eq!(model.root().first_error().unwrap().path(), "/slow");
}

#[tokio::test]
async fn failing_rule_rolls_back_and_surfaces() {
    let model = custom_model(
        json!({"properties": {"user": {"lookup": true}}}),
        json!({"user": "ada"}),
    );
    let err = model.validate(ValidateOptions::default()).await.unwrap_err();
    assert!(matches!(err, ModelError::Rule(_)));
    assert!(err.to_string().contains("resolver unavailable"));
    assert!(model.root().pristine());
    assert!(model.reference("/user").pristine());
}

#[tokio::test]
async fn revalidating_unchanged_tree_is_idempotent() {
    let model = model(
        json!({
            "properties": {
                "name": {"type": "string", "filter": "trim", "maxLength": 10},
                "tags": {"items": {"type": "string"}, "minItems": 1}
            }
        }),
        json!({"name": " ada ", "tags": ["x"]}),
    );
    let snapshot = |model: &Model| -> Vec<(String, State)> {
        model
            .paths()
            .into_iter()
            .map(|path| {
                let mut state = model.reference(&path).state();
                state.val_lock = 0;
                (path, state)
            })
            .collect()
    };

    assert!(model.validate(ValidateOptions::default()).await.unwrap());
    let first = snapshot(&model);
    assert!(model.validate(ValidateOptions::default()).await.unwrap());
    assert_eq!(first, snapshot(&model));
    assert_eq!(model.value(), Some(json!({"name": "ada", "tags": ["x"]})));
}

#[tokio::test]
async fn depends_on_pulls_dependent_into_scope() {
    let model = model(
        json!({
            "properties": {
                "password": {"type": "string"},
                "confirm": {"dependsOn": "../password", "minLength": 3},
                "other": {"minimum": 10}
            }
        }),
        json!({"password": "secret", "confirm": "x", "other": 1}),
    );
    model
        .reference("/password")
        .validate(ValidateOptions::default())
        .await
        .unwrap();

    assert_eq!(model.reference("/password").status(), Status::Success);
    assert_eq!(model.reference("/confirm").status(), Status::Error);
    assert!(model.reference("/other").pristine());
    assert!(model.root().pristine());
}

#[tokio::test]
async fn recorded_dependencies_widen_scope() {
    let model = model(
        json!({
            "properties": {
                "password": {"type": "string", "dependencies": ["../confirm"]},
                "confirm": {"minLength": 3}
            }
        }),
        json!({"password": "secret", "confirm": "xyz"}),
    );
    model.validate(ValidateOptions::default()).await.unwrap();
    assert_eq!(model.reference("/confirm").status(), Status::Success);

    model.reference("/confirm").set_value(Some(json!("x"))).unwrap();
    model
        .reference("/password")
        .validate(ValidateOptions::default())
        .await
        .unwrap();
    assert_eq!(model.reference("/confirm").status(), Status::Error);
}

fn vehicle() -> Value {
    json!({
        "properties": {"kind": {"type": "string"}},
        "if": {"properties": {"kind": {"const": "car"}}},
        "then": {"properties": {"wheels": {"minimum": 3}}},
        "else": {"properties": {"wings": {"minimum": 2}}}
    })
}

#[tokio::test]
async fn root_run_evicts_references_of_abandoned_branch() {
    let model = model(vehicle(), json!({"kind": "car", "wheels": 4}));
    assert!(model.validate(ValidateOptions::default()).await.unwrap());
    assert!(model.paths().contains(&"/wheels".to_string()));

    model
        .root()
        .set_value(Some(json!({"kind": "plane", "wheels": 4, "wings": 1})))
        .unwrap();
    assert!(!model.validate(ValidateOptions::default()).await.unwrap());
    assert!(!model.paths().contains(&"/wheels".to_string()));
    assert!(model.reference("/wheels").pristine());
    assert_eq!(model.reference("/wings").status(), Status::Error);
}

#[tokio::test]
async fn scoped_run_evicts_only_under_its_scope() {
    let model = model(
        json!({"properties": {"vehicle": vehicle(), "owner": {"type": "string"}}}),
        json!({"vehicle": {"kind": "car", "wheels": 4}, "owner": "ada"}),
    );
    model.validate(ValidateOptions::default()).await.unwrap();
    assert!(model.paths().contains(&"/vehicle/wheels".to_string()));

    let vehicle = model.reference("/vehicle");
    vehicle.child("kind").set_value(Some(json!("plane"))).unwrap();
    vehicle.child("wings").set_value(Some(json!(2))).unwrap();
    assert!(vehicle.validate(ValidateOptions::default()).await.unwrap());

    let paths = model.paths();
    assert!(!paths.contains(&"/vehicle/wheels".to_string()));
    assert!(paths.contains(&"/vehicle/wings".to_string()));
    assert_eq!(model.reference("/owner").status(), Status::Success);
}

#[tokio::test]
async fn unreached_target_is_not_reported_valid() {
    let model = model(vehicle(), json!({"kind": "car", "wheels": 4, "wings": 1}));

    let wings = model.reference("/wings");
    assert!(!wings.validate(ValidateOptions::default()).await.unwrap());
    assert!(wings.pristine());
    assert!(!model
        .reference("/nowhere")
        .validate(ValidateOptions::default())
        .await
        .unwrap());

    let wheels = model.reference("/wheels");
    assert!(wheels.validate(ValidateOptions::default()).await.unwrap());
    assert_eq!(wheels.status(), Status::Success);
}

#[tokio::test]
async fn scope_option_narrows_target() {
    let model = model(
        json!({"properties": {"a": {"maximum": 1}, "b": {"maximum": 1}}}),
        json!({"a": 5, "b": 5}),
    );
    let valid = model
        .root()
        .validate(ValidateOptions::new().scope("a"))
        .await
        .unwrap();
    assert!(!valid);
    assert_eq!(model.reference("/a").status(), Status::Error);
    assert!(model.reference("/b").pristine());
}

#[tokio::test]
async fn prepare_does_not_mark_validated() {
    let model = model(json!({"properties": {"a": {"minimum": 1}}}), json!({"a": 2}));
    assert!(model.root().prepare(ValidateOptions::default()).await.unwrap());
    assert_eq!(model.reference("/a").status(), Status::Success);
    assert!(!model.reference("/a").validated());
    assert!(!model.root().validated());

    model.validate(ValidateOptions::default()).await.unwrap();
    assert!(model.reference("/a").validated());
}

#[tokio::test]
async fn config_messages_and_defaults_apply() {
    let config = ModelConfig {
        errors: [("maximum".to_string(), "way too big".to_string())].into(),
        ..ModelConfig::default()
    };
    let model = Model::compile(
        &Compiler::with_builtins(),
        &json!({"maximum": 3}),
        Some(json!(4)),
        config,
    )
    .unwrap();
    let options = model.config().validate_options();
    assert!(!model.validate(options).await.unwrap());
    assert_eq!(model.root().message().as_deref(), Some("way too big"));
}

#[tokio::test]
async fn config_flags_apply_to_default_options() {
    let config = ModelConfig {
        coerce_types: true,
        ..ModelConfig::default()
    };
    let model = Model::compile(
        &Compiler::with_builtins(),
        &json!({"type": "number"}),
        Some(json!("42")),
        config,
    )
    .unwrap();
    assert!(model.validate(ValidateOptions::default()).await.unwrap());
    assert_eq!(model.value(), Some(json!(42)));
}

#[tokio::test]
async fn events_bracket_the_run() {
    let model = model(json!({"properties": {"a": {"default": 1}}}), json!({}));
    let mut events = model.subscribe();
    model.validate(ValidateOptions::default()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(
        seen.first(),
        Some(ModelEvent::BeforeValidation { path, .. }) if path == "/"
    ));
    assert!(matches!(
        seen.last(),
        Some(ModelEvent::AfterValidation { valid: true, .. })
    ));
    assert!(seen.contains(&ModelEvent::ValueChanged {
        path: "/a".into(),
        value: Some(json!(1)),
    }));
    assert!(seen.iter().any(|e| matches!(
        e,
        ModelEvent::StateChanged { path, state } if path == "/a" && state.status == Status::Success
    )));
}

#[test]
fn compile_error_aborts_construction() {
    let err = Model::new(&json!({"properties": {"a": {"maxLenght": 3}}}), None).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Compile(CompileError::UnknownKeyword { ref keyword, .. }) if keyword == "maxLenght"
    ));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn schema(fields: usize) -> Value {
        let mut properties = Map::new();
        for i in 0..fields {
            properties.insert(format!("f{i}"), json!({"maximum": 5}));
        }
        json!({"properties": properties})
    }

    #[derive(Debug, Clone)]
    enum Step {
        Switch,
        Root,
        Scoped,
        Overlapping,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Switch),
            Just(Step::Root),
            Just(Step::Scoped),
            Just(Step::Overlapping),
        ]
    }

    fn garage() -> Value {
        json!({
            "properties": {
                "owner": {"type": "string"},
                "vehicle": {
                    "properties": {"kind": {"type": "string"}},
                    "if": {"properties": {"kind": {"const": "car"}}},
                    "then": {"properties": {"wheels": {"minimum": 3}, "lag": {"delay": true}}},
                    "else": {"properties": {"wings": {"minimum": 2}, "lag": {"delay": true}}}
                }
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// The first error is the first invalid field in declaration order,
        /// whatever the mix of valid and invalid siblings.
        #[test]
        fn first_error_is_deterministic(values in prop::collection::vec(0u64..10, 1..8)) {
            let data: Map<String, Value> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("f{i}"), json!(v)))
                .collect();
            let model = Model::new(&schema(values.len()), Some(Value::Object(data))).unwrap();
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let valid = runtime.block_on(model.validate(ValidateOptions::default())).unwrap();

            let expected = values.iter().position(|v| *v > 5).map(|i| format!("/f{i}"));
            prop_assert_eq!(valid, expected.is_none());
            prop_assert_eq!(model.root().first_error().map(|r| r.path().to_string()), expected);
        }

        /// Whatever mix of branch switches, scoped runs, root runs and
        /// overlapping runs, only the currently taken branch stays cached.
        #[test]
        fn eviction_tracks_the_taken_branch(steps in prop::collection::vec(step(), 1..8)) {
            let model = custom_model(
                garage(),
                json!({
                    "owner": "ada",
                    "vehicle": {"kind": "car", "wheels": 4, "wings": 2, "lag": 2}
                }),
            );
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let switch_to = |car: bool| {
                let kind = if car { "car" } else { "plane" };
                model.reference("/vehicle/kind").set_value(Some(json!(kind))).unwrap();
            };
            let mut car = true;

            for step in steps {
                match step {
                    Step::Switch => {
                        car = !car;
                        switch_to(car);
                        continue;
                    }
                    Step::Root => {
                        runtime.block_on(model.validate(ValidateOptions::default())).unwrap();
                    }
                    Step::Scoped => {
                        runtime
                            .block_on(model.reference("/vehicle").validate(ValidateOptions::default()))
                            .unwrap();
                    }
                    Step::Overlapping => {
                        car = !car;
                        let root = model.root();
                        runtime
                            .block_on(async {
                                let older = root.validate(ValidateOptions::default());
                                let newer = async {
                                    switch_to(car);
                                    root.validate(ValidateOptions::default()).await
                                };
                                let (older, newer) = tokio::join!(older, newer);
                                older.and(newer)
                            })
                            .unwrap();
                    }
                }

                let (taken, abandoned) = if car {
                    ("/vehicle/wheels", "/vehicle/wings")
                } else {
                    ("/vehicle/wings", "/vehicle/wheels")
                };
                let paths = model.paths();
                prop_assert!(paths.iter().any(|p| p == taken), "{taken} missing from {paths:?}");
                prop_assert!(!paths.iter().any(|p| p == abandoned), "{abandoned} still in {paths:?}");
            }
        }

        /// Later runs always own the committed state.
        #[test]
        fn val_lock_never_regresses(runs in 1usize..5) {
            let model = Model::new(&json!({"properties": {"a": {"minimum": 0}}}), Some(json!({"a": 1}))).unwrap();
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let mut last = 0;
            for _ in 0..runs {
                runtime.block_on(model.validate(ValidateOptions::default())).unwrap();
                let lock = model.reference("/a").state().val_lock;
                prop_assert!(lock > last);
                last = lock;
            }
        }
    }
}
