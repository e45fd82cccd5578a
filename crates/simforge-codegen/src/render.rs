//! Change-detecting scene sync for instanced rendering.
//!
//! Each live instance of the render entity is compared against its scene
//! slot; only slots whose alpha, translation or colour actually changed are
//! marked dirty for the next GPU upload.

use crate::writer::CWriter;
use simforge_model::RenderSync;

/// Name of the sync routine for `sync`'s entity.
pub fn sync_function(sync: &RenderSync) -> String {
    format!("sys_sync_gcomponent_{}", sync.entity)
}

pub fn write_sync_prototypes(w: &mut CWriter, sync: &RenderSync) {
    let name = sync_function(sync);
    w.line(format!(
        "void {}_range(World* w, SceneData* s, SceneSyncState* ss, int start, int end);",
        name
    ));
    w.line(format!(
        "void {}(World* w, SceneData* s, SceneSyncState* ss);",
        name
    ));
}

pub fn write_sync_routines(w: &mut CWriter, sync: &RenderSync) {
    let name = sync_function(sync);
    let storage = sync.entity.to_lowercase();

    w.open(format!(
        "void {}_range(World* w, SceneData* s, SceneSyncState* ss, int start, int end)",
        name
    ));
    w.open("for (int i = start; i < end; i++)");

    if let Some(visibility) = &sync.visibility {
        w.line("// visibility");
        w.line(format!(
            "bool is_visible = w->{}.{}[i];",
            storage, visibility.when
        ));
        w.line("uint8_t target_alpha = is_visible ? 255 : 0;");
        w.open("if (s->instances[i].color.a != target_alpha)");
        w.line("s->instances[i].color.a = target_alpha;");
        w.line("scene_sync_mark(ss, i);");
        w.close();
        w.line("if (!is_visible) continue;");
    }

    if let Some(transform) = &sync.transform {
        w.line("// translation");
        if let Some(flag) = &transform.update_when {
            w.open(format!("if (w->{}.{}[i])", storage, flag));
        }
        let [x, y, z] = &transform.axes;
        w.line(format!("float _px = w->{}.{}[i];", storage, x));
        w.line(format!("float _py = w->{}.{}[i];", storage, y));
        w.line(format!("float _pz = w->{}.{}[i];", storage, z));
        w.open(
            "if (s->instances[i].transform.m[12] != _px || \
             s->instances[i].transform.m[13] != _py || \
             s->instances[i].transform.m[14] != _pz)",
        );
        w.line("s->instances[i].transform.m[12] = _px;");
        w.line("s->instances[i].transform.m[13] = _py;");
        w.line("s->instances[i].transform.m[14] = _pz;");
        w.line("scene_sync_mark(ss, i);");
        w.close();
        if transform.update_when.is_some() {
            w.close();
        }
    }

    if let Some(color) = &sync.color {
        w.line("// colour");
        w.line(format!("uint32_t c = w->{}.{}[i];", storage, color.from));
        w.line("uint8_t _r = (uint8_t)(c >> 16);");
        w.line("uint8_t _g = (uint8_t)(c >> 8);");
        w.line("uint8_t _b = (uint8_t)c;");
        w.open(
            "if (s->instances[i].color.r != _r || \
             s->instances[i].color.g != _g || \
             s->instances[i].color.b != _b)",
        );
        w.line("s->instances[i].color.r = _r;");
        w.line("s->instances[i].color.g = _g;");
        w.line("s->instances[i].color.b = _b;");
        w.line("scene_sync_mark(ss, i);");
        w.close();
    }

    w.close();
    w.close();
    w.blank();

    w.open(format!(
        "void {}(World* w, SceneData* s, SceneSyncState* ss)",
        name
    ));
    w.line(format!("uint32_t active_count = w->{}._active;", storage));
    w.line("scene_ensure_capacity(s, active_count);");
    w.line("s->count = active_count;");
    w.line(format!("{}_range(w, s, ss, 0, active_count);", name));
    w.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use simforge_model::render::{
        ColorKind, ColorSync, HiddenStyle, TransformKind, TransformSync, VisibilitySync,
    };

    fn sync() -> RenderSync {
        RenderSync {
            component: "CubeVisuals".to_string(),
            entity: "Cube".to_string(),
            model: "cube_model".to_string(),
            buffer: "vbo_id".to_string(),
            suppress: Vec::new(),
            visibility: Some(VisibilitySync {
                when: "active".to_string(),
                otherwise: HiddenStyle::AlphaZero,
            }),
            transform: Some(TransformSync {
                update_when: Some("is_awake".to_string()),
                kind: TransformKind::Translation,
                axes: [
                    "position_x".to_string(),
                    "position_y".to_string(),
                    "position_z".to_string(),
                ],
            }),
            color: Some(ColorSync {
                kind: ColorKind::HexToRgba,
                from: "color".to_string(),
            }),
        }
    }

    #[test]
    fn test_sync_routine_sections() {
        let mut w = CWriter::new();
        write_sync_routines(&mut w, &sync());
        let out = w.finish();

        assert!(out.starts_with(
            "void sys_sync_gcomponent_Cube_range(World* w, SceneData* s, SceneSyncState* ss, int start, int end) {\n"
        ));
        assert!(out.contains("        bool is_visible = w->cube.active[i];\n"));
        assert!(out.contains("        if (!is_visible) continue;\n"));
        assert!(out.contains("        if (w->cube.is_awake[i]) {\n"));
        assert!(out.contains("            float _pz = w->cube.position_z[i];\n"));
        assert!(out.contains("        uint32_t c = w->cube.color[i];\n"));
        assert!(out.contains("    uint32_t active_count = w->cube._active;\n"));
        assert!(out.contains("    sys_sync_gcomponent_Cube_range(w, s, ss, 0, active_count);\n"));
        assert_eq!(out.matches('{').count(), out.matches('}').count());
    }

    #[test]
    fn test_optional_sections_are_omitted() {
        let mut only_color = sync();
        only_color.visibility = None;
        only_color.transform = None;
        let mut w = CWriter::new();
        write_sync_routines(&mut w, &only_color);
        let out = w.finish();
        assert!(!out.contains("is_visible"));
        assert!(!out.contains("transform.m"));
        assert!(out.contains("color.r != _r"));
    }
}
