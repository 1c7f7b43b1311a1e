// config.rs - per-frame snapshot of the culling and visibility toggles

use bspvis_common::cvar::{with_cvar_ctx, CvarContext, CVAR_ARCHIVE, CVAR_CHEAT, CVAR_ZERO};

/// Shadow quality ordinal, ordered from cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShadowingMode {
    None = 0,
    Blob = 1,
    Esm16 = 2,
    Esm32 = 3,
    Vsm16 = 4,
    Vsm32 = 5,
    Evsm32 = 6,
}

impl ShadowingMode {
    /// Map an `r_shadows` value onto a mode, clamping out-of-range values.
    pub fn from_integer(value: i32) -> Self {
        match value {
            i32::MIN..=0 => ShadowingMode::None,
            1 => ShadowingMode::Blob,
            2 => ShadowingMode::Esm16,
            3 => ShadowingMode::Esm32,
            4 => ShadowingMode::Vsm16,
            5 => ShadowingMode::Vsm32,
            _ => ShadowingMode::Evsm32,
        }
    }
}

/// Register every cvar read by [`CullConfig::from_cvars`].
pub fn register_cvars(cvars: &mut CvarContext) {
    cvars.get("r_drawworld", "1", CVAR_CHEAT);
    cvars.get("r_nocull", "0", CVAR_CHEAT);
    cvars.get("r_nocurves", "0", CVAR_CHEAT);
    cvars.get("r_facePlaneCull", "1", CVAR_ARCHIVE);
    cvars.get("r_noLightFrustums", "0", CVAR_CHEAT);
    cvars.get("r_cullShadowPyramidFaces", "1", CVAR_ARCHIVE);
    cvars.get("r_lockpvs", "0", CVAR_CHEAT);
    cvars.get("r_novis", "0", CVAR_CHEAT);
    cvars.get("r_showcluster", "0", CVAR_ZERO);
    cvars.get("r_shadows", "2", CVAR_ARCHIVE);
    cvars.get("r_vboShadows", "1", CVAR_ARCHIVE);
    cvars.get("r_vboLighting", "1", CVAR_ARCHIVE);
}

/// Register the toggles in the process-wide cvar system. Returns false when
/// it has not been initialized.
pub fn register_global_cvars() -> bool {
    with_cvar_ctx(register_cvars).is_some()
}

/// Toggles read once per frame. Traversals only ever look at this snapshot,
/// never at the live cvars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullConfig {
    pub draw_world: bool,
    pub no_cull: bool,
    pub no_curves: bool,
    pub face_plane_cull: bool,
    pub no_light_frustums: bool,
    pub cull_shadow_pyramid_faces: bool,
    pub lock_pvs: bool,
    pub no_vis: bool,
    pub show_cluster: bool,
    /// `r_showcluster` changed since the previous snapshot; forces a re-mark.
    pub show_cluster_modified: bool,
    pub shadowing: ShadowingMode,
    pub vbo_shadows: bool,
    pub vbo_lighting: bool,
    /// At or below this tier, world lights only request the receive-light
    /// interaction.
    pub light_only_max_shadowing: ShadowingMode,
    /// Below this tier, precached interactions skip surfaces outside the view.
    pub min_shadow_caster_shadowing: ShadowingMode,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self {
            draw_world: true,
            no_cull: false,
            no_curves: false,
            face_plane_cull: true,
            no_light_frustums: false,
            cull_shadow_pyramid_faces: true,
            lock_pvs: false,
            no_vis: false,
            show_cluster: false,
            show_cluster_modified: false,
            shadowing: ShadowingMode::Esm16,
            vbo_shadows: true,
            vbo_lighting: true,
            light_only_max_shadowing: ShadowingMode::Blob,
            min_shadow_caster_shadowing: ShadowingMode::Esm16,
        }
    }
}

impl CullConfig {
    /// Snapshot the registered cvars. Clears the `r_showcluster` modified flag.
    pub fn from_cvars(cvars: &mut CvarContext) -> Self {
        let flag = |name: &str| cvars.variable_integer(name) != 0;
        let mut config = Self {
            draw_world: flag("r_drawworld"),
            no_cull: flag("r_nocull"),
            no_curves: flag("r_nocurves"),
            face_plane_cull: flag("r_facePlaneCull"),
            no_light_frustums: flag("r_noLightFrustums"),
            cull_shadow_pyramid_faces: flag("r_cullShadowPyramidFaces"),
            lock_pvs: flag("r_lockpvs"),
            no_vis: flag("r_novis"),
            show_cluster: flag("r_showcluster"),
            show_cluster_modified: false,
            shadowing: ShadowingMode::from_integer(cvars.variable_integer("r_shadows")),
            vbo_shadows: flag("r_vboShadows"),
            vbo_lighting: flag("r_vboLighting"),
            ..Self::default()
        };
        config.show_cluster_modified = cvars.take_modified("r_showcluster");
        config
    }

    /// Snapshot the process-wide cvars, if the cvar system is up.
    pub fn from_global_cvars() -> Option<Self> {
        with_cvar_ctx(|cvars| Self::from_cvars(cvars))
    }

    /// Whether a world light pass should request shadow casting at all.
    pub fn allows_world_shadows(&self) -> bool {
        self.shadowing > self.light_only_max_shadowing
    }
}
