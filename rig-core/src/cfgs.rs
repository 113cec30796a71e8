//! Single interface for registering all of the [`Setting`]s for an evaluation pass.
//!
//! [`Setting`]: rig_cfg::Setting

use rig_cfg::{Setting, SettingSetBuilder};

pub static DEFAULT_SOURCE_PATTERN: Setting<&'static str> = Setting::new(
    "default_source_pattern",
    "Files picked up, non-recursively, for targets without a source rule.",
    rig_target::DEFAULT_SOURCE_PATTERN,
);

pub static FOLLOW_SYMLINKS: Setting<bool> = Setting::new(
    "follow_symlinks",
    "Whether matching descends into symlinked directories.",
    false,
);

pub static PARALLEL_RESOLUTION: Setting<bool> = Setting::new(
    "parallel_resolution",
    "Whether the sources of independent targets are resolved on a thread pool.",
    false,
);

pub static IGNORE_PATTERN: Setting<&'static str> = Setting::new(
    "ignore_pattern",
    "Comma separated globs that are never matched or descended into, empty for none.",
    "",
);

pub fn all_settings(builder: &mut SettingSetBuilder) {
    builder
        .register(&crate::defs::DESCRIPTION_FILENAME)
        .register(&DEFAULT_SOURCE_PATTERN)
        .register(&FOLLOW_SYMLINKS)
        .register(&PARALLEL_RESOLUTION)
        .register(&IGNORE_PATTERN);
}
