//! Whole translation units generated from parsed specs and in-memory modules.

use simforge_codegen::{GenOptions, generate};
use simforge_model::{Diagnostics, ErrorKind};
use simforge_resolve::{MemoryModules, resolve_modules};
use simforge_spec::{apply_render_sync, parse_render_sync, parse_spec};

fn build(spec: &str, modules: &MemoryModules) -> (String, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let model = parse_spec(spec, &mut diagnostics).unwrap();
    let resolved = resolve_modules(&model, modules, &mut diagnostics).unwrap();
    let out = generate(&model, &resolved, &GenOptions::default(), &mut diagnostics).unwrap();
    (out, diagnostics)
}

/// Index of `needle` in `haystack`, failing the test when absent.
fn at(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("missing {:?} in:\n{}", needle, haystack))
}

// ============================================================================
// Indexing discipline
// ============================================================================

#[test]
fn test_particle_loop_indexes_its_own_array() {
    let spec = "\
UNIQUE World:
@@gravity float = 9.8f

GENERIC Particle count=100:
@@active bool
LOOP
Integrate
";
    let modules = MemoryModules::new().with("Integrate", "// REQ: Particle.active\n");
    let (out, diagnostics) = build(spec, &modules);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    assert!(out.contains("    bool active[100];\n"));
    assert!(out.contains("void system_Integrate(bool* active);\n"));
    assert!(out.contains(
        "        for (int32_t i_Particle = 0; i_Particle < w.particle._active; i_Particle++) {\n\
         \x20           system_Integrate(&w.particle.active[i_Particle]);\n"
    ));
    assert!(!out.contains("&w.particle.active[0]"));
}

#[test]
fn test_cross_entity_arguments_never_use_foreign_index() {
    let spec = "\
UNIQUE World:
@@wind float

GENERIC Boid count=64:
@@x float
START
Place
LOOP
Steer
END
Forget

GENERIC Hawk count=4:
@@x float
LOOP
Hunt
";
    let modules = MemoryModules::new()
        .with("Place", "// REQ: Boid.x\n// REQ: Hawk.x as hx\n")
        .with("Steer", "// REQ: Boid.x\n// REQ: Hawk.x as hx\n// REQ: World.wind\n")
        .with("Forget", "// REQ: Boid._active as n\n")
        .with("Hunt", "// REQ: Hawk.x\n// REQ: Boid.x as bx\n// REQ_STRUCT: Boid as flock\n");
    let (out, _) = build(spec, &modules);

    assert!(out.contains("system_Place(&w.boid.x[i_Boid], &w.hawk.x[0]);"));
    assert!(out.contains("system_Steer(&w.boid.x[i_Boid], &w.hawk.x[0], &w.world.wind);"));
    assert!(out.contains("system_Forget(&w.boid._active);"));
    assert!(out.contains("system_Hunt(&w.hawk.x[i_Hawk], &w.boid, &w.boid);"));
    assert!(out.contains("void system_Hunt(float* x, float* bx, Boid_Data* flock);"));
    assert!(!out.contains("hawk.x[i_Boid]"));
    assert!(!out.contains("boid.x[i_Hawk]"));
}

// ============================================================================
// Program layout
// ============================================================================

const FULL: &str = "\
SOA Vec3 float x y z
CONFIG MAX_THREADS 4

UNIQUE World:
@@cube_model int
@@vbo_id uint32
@@gravity float = -9.8f
START
Boot
END
SaveWorld

GENERIC Cube count=500:
@@active bool = true
@@is_awake bool
@@position Vec3 = {0.0f, 5.0f, 0.0f}
@@color uint32 = 0x33AAFF
@@_active int32 = 10
LOOP
Age
END
FreeCube

SYSTEM Physics
PHASE LOOP
MODE PARALLEL
PRIORITY 10

PRE_START:
LoadAssets

LOOP:
RenderAllCubes
Stats

POST_LOOP:
Throttle

END:
Shutdown
";

fn full_modules() -> MemoryModules {
    MemoryModules::new()
        .with("Boot", "")
        .with("SaveWorld", "")
        .with("Age", "// REQ: Cube.position as p\n// REQ_LIB: <raymath.h>\n")
        .with("FreeCube", "// REQ: Cube.active\n")
        .with(
            "Physics",
            "// REQ_STRUCT: Cube\nvoid system_Physics_range(World* w, int start, int end) {}\n",
        )
        .with("LoadAssets", "")
        .with("RenderAllCubes", "")
        .with("Stats", "// REQ: World.gravity as g\n")
        .with("Throttle", "")
        .with("Shutdown", "")
}

#[test]
fn test_program_order() {
    let (out, diagnostics) = build(FULL, &full_modules());
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let sections = [
        "#include <stdint.h>",
        "#include <raymath.h>",
        "#define GENERATED_MAX_THREADS 4",
        "#include \"MultithreadSupport/parallel.h\"",
        "} World_Data;",
        "} Cube_Data;",
        "} World;",
        "void system_Physics_range(World* w, int start, int end);",
        "#include \"modules/Age.c\"",
        "#include \"modules/Throttle.c\"",
        "void system_Physics_dispatch(World* w) {",
        "static void init_world(World* w) {",
        "int main(void) {",
        "    // PRE_START\n    system_LoadAssets(&w);",
        "    // START\n    // World.START\n    system_Boot(&w);",
        "    while (w.running) {",
        "        system_Physics_dispatch(&w);\n        system_RenderAllCubes(&w);\n        system_Stats(&w.world.gravity);",
        "        // Cube.LOOP",
        "        // POST_LOOP\n        system_Throttle(&w);",
        "    // Cube.END",
        "    // World.END\n    system_SaveWorld(&w);",
        "    system_Shutdown(&w);",
        "    return 0;",
    ];
    let mut last = 0;
    for section in sections {
        let position = at(&out, section);
        assert!(position >= last, "{:?} is out of order", section);
        last = position;
    }
}

#[test]
fn test_soa_fields_and_defaults() {
    let (out, _) = build(FULL, &full_modules());
    assert!(out.contains(
        "    float position_x[500];\n    float position_y[500];\n    float position_z[500];\n"
    ));
    assert!(out.contains("void system_Age(float* p_x, float* p_y, float* p_z);"));
    assert!(out.contains(
        "system_Age(&w.cube.position_x[i_Cube], &w.cube.position_y[i_Cube], &w.cube.position_z[i_Cube]);"
    ));

    assert!(out.contains("    w->world.gravity = -9.8f;\n"));
    assert!(out.contains("    w->cube._capacity = 500;\n    w->cube._active = 10;\n"));
    assert!(out.contains("        w->cube.active[i] = true;\n"));
    assert!(out.contains("        w->cube.position_y[i] = 5.0f;\n"));
    assert!(out.contains("        w->cube.color[i] = 0x33AAFF;\n"));
    assert!(!out.contains("position_x[i] ="));
    assert!(!out.contains("int32_t _active[500]"));
}

#[test]
fn test_parallel_wrapper_dispatches_over_first_generic() {
    let (out, _) = build(FULL, &full_modules());
    assert!(out.contains(
        "void system_Physics_dispatch(World* w) {\n    parallel_run(w, (SystemRangeFn)system_Physics_range, w->cube._active);\n}\n"
    ));
}

#[test]
fn test_parallel_system_in_entity_loop_warns() {
    let spec = "\
SYSTEM Spread
MODE PARALLEL

UNIQUE World:

GENERIC Seed count=8:
LOOP
Spread
";
    let modules = MemoryModules::new()
        .with("Spread", "void system_Spread_range(World* w, int start, int end) {}\n");
    let (out, diagnostics) = build(spec, &modules);
    assert!(out.contains("system_Spread_dispatch(&w);"));
    assert!(
        diagnostics
            .iter()
            .any(|d| d.kind == ErrorKind::Structure && d.message.contains("once per instance"))
    );
}

#[test]
fn test_module_include_dir_is_configurable() {
    let spec = "UNIQUE World:\nLOOP:\nTick\n";
    let mut diagnostics = Diagnostics::new();
    let model = parse_spec(spec, &mut diagnostics).unwrap();
    let modules = MemoryModules::new().with("Tick", "");
    let resolved = resolve_modules(&model, &modules, &mut diagnostics).unwrap();
    let options = GenOptions {
        module_include_dir: "../systems/".to_string(),
    };
    let out = generate(&model, &resolved, &options, &mut diagnostics).unwrap();
    assert!(out.contains("#include \"../systems/Tick.c\"\n"));
    assert!(!out.contains("SceneData"));
}

// ============================================================================
// Render sync
// ============================================================================

const GSPEC: &str = "\
[gcomponent CubeVisuals]
entity = Cube

[visibility]
when = active
else = alpha_zero

[transform]
update_when = is_awake
type = translation
from = position.x, position.y, position.z

[color]
type = hex_to_rgba
from = color
";

#[test]
fn test_render_sync_program() {
    let mut diagnostics = Diagnostics::new();
    let mut model = parse_spec(FULL, &mut diagnostics).unwrap();
    let sync = parse_render_sync(GSPEC, &model, &mut diagnostics).unwrap();
    apply_render_sync(&mut model, sync);
    let resolved = resolve_modules(&model, &full_modules(), &mut diagnostics).unwrap();
    let out = generate(&model, &resolved, &GenOptions::default(), &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    assert!(out.contains("#include \"backend/backend_raylib.h\"\n"));
    assert!(out.contains("SceneData s = {0};\nSceneSyncState ss = {0};\n"));
    assert!(out.contains("#include \"backend/backend_raylib.c\"\n"));
    assert!(out.contains("    scene_init(&s, 500);\n"));
    assert!(out.contains("        scene_sync_reset(&ss);\n"));
    assert!(out.contains(
        "        sys_sync_gcomponent_Cube(&w, &s, &ss);\n\
         \x20       backend_raylib_update_gpu(&w.world.vbo_id, &s, &ss);\n\
         \x20       backend_raylib_draw_instanced(w.world.cube_model, &s);\n"
    ));
    assert!(out.contains("    scene_free(&s);\n"));

    // Suppressed renderer is neither called nor included.
    assert!(!out.contains("system_RenderAllCubes"));
    assert!(!out.contains("RenderAllCubes.c"));
}
