// Copyright @yucwang 2026

#![allow(dead_code)]

pub extern crate nalgebra as na;

mod core;
mod io;
mod math;
mod pipeline;
mod volume;

use indicatif::{ ProgressBar, ProgressStyle };

use self::core::config::load_config;
use self::core::transfer::TransferTables;
use self::io::png_utils;
use self::math::constants::{ Matrix4f, Vector3f };
use self::pipeline::cubemap::Cubemap;
use self::pipeline::raytrace::RaytracePass;
use self::pipeline::resolve::resolve;
use self::volume::ingest::load_scan;

use std::env;

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <config.xml> <scan_folder> <output.png> [--itrs N]", args[0]);
        std::process::exit(1);
    }

    let config_path = &args[1];
    let scan_folder = std::path::Path::new(&args[2]);
    let output_path = &args[3];
    let mut itrs_override: Option<u32> = None;

    let mut i = 4;
    while i < args.len() {
        match args[i].as_str() {
            "--itrs" => {
                i += 1;
                itrs_override = args.get(i).and_then(|v| v.parse::<u32>().ok());
            }
            _ => {}
        }
        i += 1;
    }

    let config = load_config(config_path)
        .expect("failed to load config");
    let scan = load_scan(scan_folder, config.cutting_plane, config.mask_mode)
        .expect("failed to load scan");

    let tables = TransferTables::from_schemes(&config.color, &config.opacity,
                                              config.render.table_resolution);
    let cubemap = match config.cubemap_folder.as_deref() {
        Some(folder) => Cubemap::from_folder(folder).expect("failed to load cubemap"),
        None => Cubemap::constant(Vector3f::new(0.8, 0.8, 0.8)),
    };

    let mut pass = RaytracePass::new(
        config.render.size,
        config.render.samples,
        &scan,
        &tables,
        config.render.bake_resolution,
    ).expect("failed to build raytrace pass");

    let view = Matrix4f::new_translation(&Vector3f::new(0.0, 0.0, -0.5));
    let itrs = itrs_override.unwrap_or(config.render.itrs).max(1);

    let progress = ProgressBar::new(itrs as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} iterations")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    for _ in 0..itrs {
        pass.execute(&scan, &tables, &cubemap, &view)
            .expect("iteration failed");
        progress.inc(1);
    }
    progress.finish();

    let image = resolve(pass.accum(), config.render.samples);
    png_utils::write_png_to_file(&image, output_path);
}
