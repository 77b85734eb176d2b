use anyhow::{Context, Result};
use blockline::cli::commands::{
    AddBlockCommand, OrderCommand, RemoveBlockCommand, ShowCommand, VariableCommand, VariablesCommand,
};
use blockline::cli::output::*;
use blockline::cli::{Cli, Command};
use blockline::{Block, Pipeline, PipelineError, VariableManager};
use std::path::Path;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Create(cmd) => create_pipeline(&cli.repo, &cli.template, &cmd.name)?,
        Command::List => list_pipelines(&cli.repo)?,
        Command::Show(cmd) => show_pipeline(&cli.repo, cmd)?,
        Command::Order(cmd) => show_order(&cli.repo, cmd)?,
        Command::Blocks => list_blocks(&cli.repo)?,
        Command::AddBlock(cmd) => add_block(&cli.repo, cmd)?,
        Command::RemoveBlock(cmd) => remove_block(&cli.repo, cmd)?,
        Command::Variable(cmd) => show_variable(&cli.repo, cmd)?,
        Command::Variables(cmd) => list_variables(&cli.repo, cmd)?,
    }

    Ok(())
}

fn load_pipeline(repo: &Path, uuid: &str) -> Result<Pipeline> {
    Pipeline::load(uuid, repo).with_context(|| format!("Failed to load pipeline {}", uuid))
}

fn create_pipeline(repo: &Path, template: &Path, name: &str) -> Result<()> {
    let pipeline = Pipeline::create(name, repo, template).context("Failed to create pipeline")?;
    println!(
        "{} Created pipeline {} at {}",
        CHECK,
        style(&pipeline.uuid).bold(),
        style(pipeline.dir_path().display()).dim()
    );
    Ok(())
}

fn list_pipelines(repo: &Path) -> Result<()> {
    let pipelines = Pipeline::list_all(repo)?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in {}", INFO, repo.display());
        return Ok(());
    }

    println!("{} Pipelines:", INFO);
    for uuid in &pipelines {
        println!("  {}", style(uuid).bold());
    }
    Ok(())
}

fn show_pipeline(repo: &Path, cmd: &ShowCommand) -> Result<()> {
    let pipeline = load_pipeline(repo, &cmd.pipeline)?;

    if cmd.json {
        let json = serde_json::to_string_pretty(&pipeline.to_config())?;
        println!("{}", json);
    } else {
        print!("{}", format_pipeline(&pipeline));
    }
    Ok(())
}

fn show_order(repo: &Path, cmd: &OrderCommand) -> Result<()> {
    let pipeline = load_pipeline(repo, &cmd.pipeline)?;
    let order = pipeline.execution_order()?;

    println!("{} Execution order for {}:", INFO, style(&pipeline.uuid).bold());
    for (i, uuid) in order.iter().enumerate() {
        println!("  {}. {}", i + 1, style(uuid).cyan());
    }
    Ok(())
}

fn list_blocks(repo: &Path) -> Result<()> {
    let blocks = Block::list_all(repo)?;

    if blocks.is_empty() {
        println!("{} No blocks found in {}", INFO, repo.display());
        return Ok(());
    }

    for (block_type, uuids) in &blocks {
        println!("{} {}", INFO, format_block_type(*block_type));
        for uuid in uuids {
            println!("  {}", uuid);
        }
    }
    Ok(())
}

fn add_block(repo: &Path, cmd: &AddBlockCommand) -> Result<()> {
    let mut pipeline = load_pipeline(repo, &cmd.pipeline)?;
    let line = format_block(
        pipeline
            .create_block(&cmd.name, cmd.block_type, &cmd.upstream)
            .context("Failed to add block")?,
    );

    println!("{} Added {} to {}", CHECK, line, style(&pipeline.uuid).bold());
    Ok(())
}

fn remove_block(repo: &Path, cmd: &RemoveBlockCommand) -> Result<()> {
    let mut pipeline = load_pipeline(repo, &cmd.pipeline)?;

    match pipeline.remove_block(&cmd.block) {
        Ok(block) => {
            println!(
                "{} Removed {} from {}",
                CHECK,
                style(&block.uuid).bold(),
                style(&pipeline.uuid).bold()
            );
            Ok(())
        }
        Err(e @ PipelineError::DependencyExists { .. }) => {
            println!("{} {}", CROSS, style(&e).red());
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn show_variable(repo: &Path, cmd: &VariableCommand) -> Result<()> {
    let variables = VariableManager::new(repo);
    let data = variables
        .get_variable(&cmd.pipeline, &cmd.block, &cmd.variable, cmd.variable_type)
        .with_context(|| format!("Failed to read variable {}", cmd.variable))?;

    println!("{}", format_variable(&data, cmd.limit)?);
    Ok(())
}

fn list_variables(repo: &Path, cmd: &VariablesCommand) -> Result<()> {
    let variables = VariableManager::new(repo);
    let uuids = variables.get_variables_by_block(&cmd.pipeline, &cmd.block)?;

    if uuids.is_empty() {
        println!("{} No variables stored for block {}", WARN, style(&cmd.block).bold());
        return Ok(());
    }

    println!("{} Variables of {}:", INFO, style(&cmd.block).bold());
    for uuid in &uuids {
        println!("  {}", uuid);
    }
    Ok(())
}
