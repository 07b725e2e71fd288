//! End-to-end reflection: deterministic assignment over real shaders.

mod common;

use arclight_ast::Stage;
use arclight_preprocess::OptionTable;
use arclight_reflect::{reflect, ReflectionTable};

fn fingerprint(table: &ReflectionTable) -> Vec<(String, u32, u32)> {
    let mut all: Vec<(String, u32, u32)> = Vec::new();
    for e in &table.inputs {
        all.push((format!("in:{}", e.name), e.location, 0));
    }
    for e in &table.outputs {
        all.push((format!("out:{}", e.name), e.location, 0));
    }
    for e in &table.externals {
        all.push((format!("ext:{}", e.name), e.set, e.binding));
    }
    all
}

#[test]
fn reflection_is_identical_across_runs() {
    for name in ["phong", "fullscreen"] {
        let source = common::load_demo(name);
        for stage in [Stage::Vertex, Stage::Fragment] {
            let module = common::specialize(&source, stage, &OptionTable::new());
            let a = reflect(&module, stage).unwrap();
            let b = reflect(&module, stage).unwrap();
            assert_eq!(fingerprint(&a), fingerprint(&b), "{name}/{stage}");
        }
    }
}

#[test]
fn phong_fragment_interface() {
    let module = common::specialize(
        &common::load_demo("phong"),
        Stage::Fragment,
        &OptionTable::new(),
    );
    let table = reflect(&module, Stage::Fragment).unwrap();

    assert_eq!(table.inputs.len(), 2);
    assert_eq!(table.inputs[0].name, "fsNormal");
    assert_eq!(table.inputs[0].location, 0);
    assert_eq!(table.inputs[1].name, "fsUv");
    assert_eq!(table.inputs[1].location, 1);

    assert_eq!(table.outputs.len(), 1);
    assert_eq!(table.outputs[0].name, "fragColor");

    // Untextured default: baseColor and lightDirs only.
    let base = table.external("baseColor").unwrap();
    assert_eq!((base.set, base.binding), (1, 1));
    assert!(!base.is_sampler);
    let lights = table.external("lightDirs").unwrap();
    assert_eq!((lights.set, lights.binding), (1, 2));
    assert!(table.external("albedoMap").is_none());
    assert!(table.external("camera").is_none());
}

#[test]
fn explicit_bindings_survive_specialization() {
    let module = common::specialize(
        &common::load_demo("phong"),
        Stage::Vertex,
        &OptionTable::new(),
    );
    let table = reflect(&module, Stage::Vertex).unwrap();
    let camera = table.external("camera").unwrap();
    assert_eq!((camera.set, camera.binding), (0, 0));
    assert!(camera.explicit);
    let model = table.external("model").unwrap();
    assert_eq!((model.set, model.binding), (0, 1));
}
