//! Resolution against module files on disk.

use simforge_model::{Diagnostics, ErrorKind};
use simforge_resolve::{FsModules, resolve_modules};
use simforge_spec::parse_spec;
use std::fs;

const WORLD: &str = "\
SOA Vec2 float x y

UNIQUE World:
@@gravity float = 9.8f

GENERIC Particle count=100:
@@active bool
@@position Vec2
LOOP
Fall

LOOP:
Census
";

#[test]
fn test_resolves_modules_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("Fall.c"),
        "// REQ: Particle.active\n// REQ: Particle.position as p\n// REQ: World.gravity as g\nvoid system_Fall(bool* active, float* p_x, float* p_y, float* g) {}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("Census.c"),
        "// REQ_STRUCT: Particle as ps\n// REQ: Particle._active as live\n",
    )
    .unwrap();

    let model = parse_spec(WORLD, &mut Diagnostics::new()).unwrap();
    let mut diagnostics = Diagnostics::new();
    let modules = resolve_modules(&model, &FsModules::new(dir.path()), &mut diagnostics).unwrap();

    let fall = &modules["Fall"];
    assert_eq!(fall.path, dir.path().join("Fall.c"));
    let aliases: Vec<_> = fall.requirements.iter().map(|r| r.alias.as_str()).collect();
    assert_eq!(aliases, ["active", "p_x", "p_y", "g"]);

    let census = &modules["Census"];
    assert_eq!(census.struct_requirements[0].alias, "ps");
    assert!(census.requirements[0].is_reserved());
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Fall.c"), "").unwrap();

    let model = parse_spec(WORLD, &mut Diagnostics::new()).unwrap();
    let error = resolve_modules(&model, &FsModules::new(dir.path()), &mut Diagnostics::new())
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::MissingModule);
    assert_eq!(error.file, Some(dir.path().join("Census.c")));
}

#[test]
fn test_malformed_marker_reports_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Fall.c"), "#include <math.h>\n\n// REQ: Particle\n").unwrap();
    fs::write(dir.path().join("Census.c"), "").unwrap();

    let model = parse_spec(WORLD, &mut Diagnostics::new()).unwrap();
    let error = resolve_modules(&model, &FsModules::new(dir.path()), &mut Diagnostics::new())
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::MalformedMarker);
    assert_eq!(error.span.line, 3);
    assert_eq!(error.file, Some(dir.path().join("Fall.c")));
}
