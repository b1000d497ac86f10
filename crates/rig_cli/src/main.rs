//! rigctl: create, inspect and dry-run rig project files.
//!
//! Builds run against the in-memory scene, so a project can be checked
//! without a host application.

use std::env;

use anyhow::{bail, Context, Result};
use rig_core::{MemoryScene, ModuleSpine, Project, RigModule};

const USAGE: &str = "\
Usage:
  rigctl template <out.json> [spine_num]
  rigctl inspect <project.json>
  rigctl build <project.json> [--save <out.json>]";

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("template") => template(&args[1..]),
        Some("inspect") => inspect(&args[1..]),
        Some("build") => build(&args[1..]),
        _ => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

/// Write a project holding a single spine module.
fn template(args: &[String]) -> Result<()> {
    let Some(out) = args.first() else {
        bail!("missing output path\n{}", USAGE);
    };
    let spine_num = match args.get(1) {
        Some(n) => n
            .parse::<usize>()
            .with_context(|| format!("invalid spine count \"{}\"", n))?,
        None => 3,
    };

    let mut spine = ModuleSpine::new();
    spine.set_spine_num(spine_num);
    let mut project = Project::new("template");
    project.add_to_modules(Box::new(spine));
    project
        .save_to_file(out)
        .with_context(|| format!("failed to write {}", out))?;
    println!("Wrote template with {} spine(s) to {}", spine_num, out);
    Ok(())
}

fn inspect(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("missing project path\n{}", USAGE);
    };
    let project = load(path)?;

    println!("\n=== Project: {} ===", project.name());
    if let Some(prefix) = project.prefix() {
        println!("Prefix: {}", prefix);
    }
    println!("Modules: {}", project.modules().len());
    println!("Valid: {}", project.is_valid());

    for module in project.modules() {
        print_module(module.as_ref());
    }
    Ok(())
}

fn print_module(module: &dyn RigModule) {
    let base = module.base();
    println!(
        "\n--- {} \"{}\"{} ---",
        module.get_module_class_name(true),
        base.name(),
        if base.is_active() { "" } else { " (inactive)" }
    );
    for proxy in base.proxies() {
        let position = proxy.transform().map(|t| t.position).unwrap_or_default();
        println!(
            "  {} [{}] at ({:.2}, {:.2}, {:.2}) scale {:.2}",
            proxy.name(),
            proxy.meta_type().unwrap_or("-"),
            position.x,
            position.y,
            position.z,
            proxy.locator_scale()
        );
    }
}

/// Build proxies and rig into an in-memory scene and print the hierarchy.
fn build(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("missing project path\n{}", USAGE);
    };
    let save_path = match args.get(1).map(String::as_str) {
        Some("--save") => Some(args.get(2).context("--save needs a path")?),
        Some(other) => bail!("unexpected argument \"{}\"\n{}", other, USAGE),
        None => None,
    };

    let mut project = load(path)?;
    if !project.is_valid() {
        bail!("project \"{}\" has no modules", project.name());
    }

    let mut scene = MemoryScene::new();
    let proxies = project.build_proxy(&mut scene)?;
    log::info!("Proxy build created {} guides", proxies.len());
    project.build_rig(&mut scene)?;

    println!("\n=== Scene ({} nodes) ===", scene.node_count());
    print!("{}", scene.outline());

    if let Some(save_path) = save_path {
        // Derived placements (spine in-betweens) are saved as transforms
        project.read_data_from_scene(&scene);
        project
            .save_to_file(save_path)
            .with_context(|| format!("failed to write {}", save_path))?;
        println!("\nSaved project to {}", save_path);
    }
    Ok(())
}

fn load(path: &str) -> Result<Project> {
    Project::load_from_file(path).with_context(|| format!("failed to load project {}", path))
}
