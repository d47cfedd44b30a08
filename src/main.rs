#![deny(future_incompatible)]
#![deny(nonstandard_style)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::many_single_char_names,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

use std::{
    collections::HashMap,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
    time::Instant,
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use bytemuck::{Pod, Zeroable};
use log::{debug, info, warn};
use nalgebra as na;
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use approx::{assert_abs_diff_eq, assert_ulps_eq};

mod assets;
mod img;
mod math;
mod pt;
mod scene;

use assets::*;
use img::*;
use math::*;
use pt::*;
use scene::*;

const PI: f32 = std::f32::consts::PI;
const TAU: f32 = std::f32::consts::TAU;
const INV_PI: f32 = std::f32::consts::FRAC_1_PI;

//
// Main
//

#[derive(clap::Parser)]
#[clap(author, version, about)]
struct CliArgs {
    /// Scene description file (JSON).
    scene: PathBuf,
}

fn main() -> Result<()> {
    use clap::Parser;

    // Init logging.
    env_logger::init();

    let args = CliArgs::parse();

    // Load.
    let timer = Instant::now();
    let scene = Scene::load(&args.scene)?;
    info!(
        "Loaded scene {} in {:.03} s ({} shapes, {} nodes, {} lights)",
        args.scene.display(),
        timer.elapsed().as_secs_f64(),
        scene.bvh.shapes().len(),
        scene.bvh.node_count(),
        scene.lights.len()
    );

    // Render and write.
    render_scene(&scene)
}
