use keyline_core::{
    AnimationDocument, ControllerState, DocumentError, Engine, EngineError, ExportScope,
    HostAtom, HostEntity, KeylineConfig, NameConflictPolicy, Transform, Vector3, Quaternion,
    fixtures::{DEMO_ATOM_TYPE, demo_animation, demo_host},
    persistence::list_animation_files,
};
use tempfile::tempdir;

fn demo_engine() -> Engine<HostAtom> {
    let mut engine = Engine::new(demo_host());
    engine.replace_animation(demo_animation());
    engine
}

fn clip_names(engine: &Engine<HostAtom>) -> Vec<String> {
    engine
        .animation()
        .clips()
        .iter()
        .map(|clip| clip.animation_name.clone())
        .collect()
}

#[test]
fn documents_for_another_entity_type_are_refused() {
    let json = demo_engine()
        .export_json(&ExportScope::AllAnimations)
        .expect("export should succeed");
    let mut prop = Engine::new(HostAtom::new("Prop"));

    let error = prop.import_json(&json).expect_err("atom type should not match");

    assert!(matches!(
        error,
        EngineError::Document(DocumentError::AtomTypeMismatch { .. })
    ));
    assert_eq!(clip_names(&prop), vec!["Anim 1".to_string()]);
}

#[test]
fn duplicate_names_are_renamed_on_import() {
    let mut engine = demo_engine();
    let json = engine
        .export_json(&ExportScope::Animation("Walk".to_string()))
        .expect("export should succeed");

    let summary = engine.import_json(&json).expect("import should succeed");

    assert_eq!(summary.added, vec!["Walk 2".to_string()]);
    assert_eq!(summary.renamed, vec![("Walk".to_string(), "Walk 2".to_string())]);
    assert_eq!(summary.selected, "Walk 2");
    assert_eq!(engine.animation().current().animation_name, "Walk 2");
    assert_eq!(engine.animation().clips().len(), 5);
}

#[test]
fn replace_policy_swaps_the_existing_clip() {
    let mut config = KeylineConfig::default();
    config.editing.name_conflict_policy = NameConflictPolicy::Replace;
    let mut engine = Engine::with_config(demo_host(), config).expect("engine should build");
    engine.replace_animation(demo_animation());

    let mut document = engine
        .export_document(&ExportScope::Animation("Walk".to_string()))
        .expect("export should succeed");
    document.clips[0].set_loop(true);

    let summary = engine.import_document(document).expect("import should succeed");

    assert_eq!(summary.replaced, vec!["Walk".to_string()]);
    assert_eq!(engine.animation().clips().len(), 4);
    assert!(engine
        .animation()
        .clip("Walk")
        .expect("walk should still exist")
        .is_looping());
}

#[test]
fn controllers_the_entity_lacks_are_reported() {
    let mut engine = demo_engine();
    let mut document = engine
        .export_document(&ExportScope::Animation("Walk".to_string()))
        .expect("export should succeed");
    let pose = ControllerState::new(
        1,
        1,
        Transform::new(Vector3::new(0.0, 0.5, 0.0), Quaternion::IDENTITY),
    );
    document
        .controllers_state
        .insert("tailControl".to_string(), pose);
    document.controllers_state.insert("control".to_string(), pose);

    let summary = engine.import_document(document).expect("import should succeed");

    assert_eq!(summary.missing_controllers, vec!["tailControl".to_string()]);
    assert_eq!(
        summary.restored_controllers,
        vec!["hipControl".to_string(), "lHandControl".to_string()]
    );
    let root = engine
        .host()
        .controller_state("control")
        .expect("root controller exists");
    assert!((root.local_position.y - 0.0).abs() < f32::EPSILON);
}

#[test]
fn single_animation_export_carries_only_its_controllers() {
    let document = demo_engine()
        .export_document(&ExportScope::Animation("Idle".to_string()))
        .expect("export should succeed");

    assert_eq!(document.clips.len(), 1);
    assert_eq!(document.atom_type, DEMO_ATOM_TYPE);
    let controllers: Vec<&str> = document.controllers_state.keys().map(String::as_str).collect();
    assert_eq!(controllers, vec!["headControl", "hipControl"]);
}

#[test]
fn pose_export_skips_the_root_controller() {
    let document = demo_engine()
        .export_document(&ExportScope::PoseAndAllAnimations)
        .expect("export should succeed");

    assert_eq!(document.clips.len(), 4);
    assert!(!document.controllers_state.contains_key("control"));
    assert!(document.controllers_state.contains_key("rFootControl"));
}

#[test]
fn unknown_export_scopes_fail() {
    let result = demo_engine().export_document(&ExportScope::from_label("Dance"));
    assert!(matches!(result, Err(EngineError::AnimationNotFound(_))));
}

#[test]
fn documents_without_clips_are_refused() {
    let mut engine = demo_engine();
    let document = AnimationDocument::new(DEMO_ATOM_TYPE, Vec::new());

    let error = engine
        .import_document(document)
        .expect_err("empty documents should be refused");

    assert!(matches!(error, EngineError::Document(DocumentError::NoClips)));
    assert_eq!(engine.animation().clips().len(), 4);
}

#[test]
fn one_broken_clip_aborts_the_whole_import() {
    let mut engine = demo_engine();
    let json = engine
        .export_json(&ExportScope::AllAnimations)
        .expect("export should succeed");
    let mut value: serde_json::Value = serde_json::from_str(&json).expect("export is json");
    value["Clips"][2]["AnimationLength"] = serde_json::json!(9.0);

    let error = engine
        .import_json(&value.to_string())
        .expect_err("a clip without its end key should be refused");

    assert!(matches!(
        error,
        EngineError::Document(DocumentError::InvalidClip { .. })
    ));
    assert_eq!(engine.animation().clips().len(), 4);
}

#[test]
fn state_codes_are_written_as_strings() {
    let json = demo_engine()
        .export_json(&ExportScope::PoseAndAllAnimations)
        .expect("export should succeed");
    let value: serde_json::Value = serde_json::from_str(&json).expect("export is json");

    let hip = &value["ControllersState"]["hipControl"];
    assert_eq!(hip["currentPositionState"], serde_json::json!("1"));
    assert_eq!(hip["currentRotationState"], serde_json::json!("1"));
    assert!(hip["localRotation"]["w"].is_number());
}

#[test]
fn saved_files_import_into_a_fresh_session() {
    let temp = tempdir().expect("tempdir should be creatable");
    let source = demo_engine();
    let path = source
        .export_to_path(&temp.path().join("demo"), &ExportScope::PoseAndAllAnimations)
        .expect("export should be written");
    assert_eq!(path, temp.path().join("demo.json"));

    let listed = list_animation_files(temp.path(), "json").expect("listing should succeed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "demo");

    let mut engine = Engine::new(demo_host());
    let summary = engine
        .import_from_path(&path)
        .expect("import should succeed");

    assert_eq!(summary.added.len(), 4);
    assert_eq!(summary.restored_controllers.len(), 4);
    assert!(summary.missing_controllers.is_empty());
    assert_eq!(summary.selected, "Blink");
    assert_eq!(summary.samples.len(), 2);
    assert_eq!(
        clip_names(&engine),
        vec!["Anim 1", "Idle", "Idle to Walk", "Walk", "Blink"]
    );
}

#[test]
fn missing_files_surface_as_io_errors() {
    let temp = tempdir().expect("tempdir should be creatable");
    let mut engine = Engine::new(demo_host());

    let error = engine
        .import_from_path(&temp.path().join("absent.json"))
        .expect_err("missing file should fail");

    assert!(matches!(error, EngineError::Io(_)));
}

#[test]
fn export_paths_use_the_configured_folder() {
    let engine = demo_engine();
    let path = engine.export_path("walk cycle");
    assert!(path.starts_with("Saves/animations"));
    assert_eq!(
        path.extension().and_then(|extension| extension.to_str()),
        Some("json")
    );
}
