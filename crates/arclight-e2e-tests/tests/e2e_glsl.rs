//! End-to-end GLSL emission over the demo shaders.

mod common;

use arclight_ast::{ConstantValue, Stage};
use arclight_backend_glsl::GlslBackend;
use arclight_preprocess::OptionTable;

#[test]
fn demos_compile_for_both_stages() {
    for name in ["phong", "fullscreen"] {
        let source = common::load_demo(name);
        for stage in [Stage::Vertex, Stage::Fragment] {
            let out = common::compile(&source, stage, &OptionTable::new(), &GlslBackend);
            let glsl = common::text(&out);
            assert!(glsl.starts_with("#version 450\n"), "{name}/{stage}");
            assert!(glsl.contains("void main() {"), "{name}/{stage}");
            assert_eq!(
                glsl.matches('{').count(),
                glsl.matches('}').count(),
                "unbalanced braces in {name}/{stage}:\n{glsl}"
            );
        }
    }
}

#[test]
fn phong_vertex_emits_the_mvp_chain() {
    let out = common::compile(
        &common::load_demo("phong"),
        Stage::Vertex,
        &OptionTable::new(),
        &GlslBackend,
    );
    let glsl = common::text(&out);
    assert!(glsl.contains("struct Camera {"));
    assert!(glsl.contains("uniform camera_block {"));
    assert!(glsl.contains("gl_Position = camera.viewProj * world;"));
    assert!(glsl.contains("layout(location = 0) in vec3 position;"));
    // Fragment-only declarations are gone.
    assert!(!glsl.contains("fragColor"));
    assert!(!glsl.contains("sampler2D"));
}

#[test]
fn phong_fragment_specializes_over_the_texture_option() {
    let source = common::load_demo("phong");

    let untextured = common::compile(&source, Stage::Fragment, &OptionTable::new(), &GlslBackend);
    let untextured = common::text(&untextured);
    assert!(!untextured.contains("texture("));
    assert!(!untextured.contains("sampler2D"));
    assert!(untextured.contains("vec4 lightDirs[2];"));

    let options = OptionTable::new().with("useAlbedoTexture", ConstantValue::Bool(true));
    let textured = common::compile(&source, Stage::Fragment, &options, &GlslBackend);
    let textured = common::text(&textured);
    assert!(textured.contains("layout(set = 1, binding = 0) uniform sampler2D albedoMap;"));
    assert!(textured.contains("texture(albedoMap, fsUv)"));
}

#[test]
fn helper_functions_survive_as_plain_glsl() {
    let out = common::compile(
        &common::load_demo("phong"),
        Stage::Fragment,
        &OptionTable::new(),
        &GlslBackend,
    );
    let glsl = common::text(&out);
    assert!(glsl.contains("float lambert(vec3 n, vec3 l) {"));
    assert!(glsl.contains("return max(dot(normalize(n), normalize(l)), 0.0);"));
}

#[test]
fn fullscreen_exposure_folds_into_the_source() {
    let options = OptionTable::new().with("exposure", ConstantValue::Float(2.0));
    let out = common::compile(
        &common::load_demo("fullscreen"),
        Stage::Fragment,
        &options,
        &GlslBackend,
    );
    let glsl = common::text(&out);
    assert!(glsl.contains("hdr.xyz * 2.0"), "glsl:\n{glsl}");
}
