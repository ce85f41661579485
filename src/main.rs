use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use nodefleet::config::{self, Config};
use nodefleet::docker::{self, CancelToken, DockerCli, OutputLine, StreamCommand};
use nodefleet::fleet::{Conflict, ConflictPolicy, FleetManager, RestartResult};
use nodefleet::logsink::FsLogSink;
use nodefleet::prompt::{self, PromptError, Prompter, StdinPrompter};

#[cfg(unix)]
mod interrupt {
    use std::sync::OnceLock;

    use nodefleet::docker::CancelToken;

    static TOKEN: OnceLock<CancelToken> = OnceLock::new();

    extern "C" fn on_sigint(_: libc::c_int) {
        if let Some(token) = TOKEN.get() {
            token.cancel();
        }
    }

    /// Route SIGINT to a shared cancel token so an in-flight restart or
    /// build winds down instead of the process dying mid-operation.
    pub fn install() -> CancelToken {
        let token = TOKEN.get_or_init(CancelToken::new).clone();
        let handler = on_sigint as extern "C" fn(libc::c_int);
        // SAFETY: the handler only performs an atomic store.
        unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
        token
    }
}

#[cfg(not(unix))]
mod interrupt {
    use nodefleet::docker::CancelToken;

    pub fn install() -> CancelToken {
        CancelToken::new()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Without the runtime nothing below can work; this is the one
    // failure that exits non-zero instead of returning to the menu.
    let version = docker::ensure_available().context("container runtime is required")?;
    println!("docker server {version}");

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let cfg = config::load(&cwd)?;

    let cancel = interrupt::install();
    let runtime = DockerCli::new();
    let logs = FsLogSink::new(&cfg.log_dir);
    let mut prompter = StdinPrompter;

    run_menu(&cfg, &runtime, &logs, &mut prompter, &cancel)
}

fn print_menu(cfg: &Config) {
    println!();
    println!("nodefleet — image {} / prefix {}", cfg.image, cfg.container_prefix);
    println!("  1) build      build the worker image");
    println!("  2) start      start N nodes");
    println!("  3) list       show all instances");
    println!("  4) logs       tail one instance's output");
    println!("  5) restart    restart one instance or all");
    println!("  6) add-one    add a single node");
    println!("  7) stop-all   remove every instance");
    println!("  0) exit");
}

fn run_menu(
    cfg: &Config,
    runtime: &DockerCli,
    logs: &FsLogSink,
    prompter: &mut StdinPrompter,
    cancel: &CancelToken,
) -> Result<()> {
    let mgr = FleetManager::new(cfg, runtime, logs);

    loop {
        print_menu(cfg);
        let line = match prompter.ask_line("> ") {
            Ok(l) => l,
            Err(PromptError::Closed) => break,
            Err(_) => continue,
        };
        let command = line.trim().to_ascii_lowercase();
        // A Ctrl-C during the previous command must not poison this one.
        cancel.reset();

        let result = match command.as_str() {
            "1" | "build" => cmd_build(cfg, cancel),
            "2" | "start" => cmd_start(&mgr, prompter),
            "3" | "list" => cmd_list(&mgr),
            "4" | "logs" => cmd_logs(cfg, &mgr, prompter, cancel),
            "5" | "restart" => cmd_restart(&mgr, prompter, cancel),
            "6" | "add-one" | "add" => cmd_add_one(&mgr, prompter),
            "7" | "stop-all" | "stop" => cmd_stop_all(&mgr),
            "0" | "exit" | "quit" => break,
            "" => continue,
            other => {
                println!("unknown command `{other}`");
                continue;
            }
        };

        // Command failures (runtime unreachable included) return to the
        // menu; only setup failures in main() end the process.
        if let Err(e) = result {
            println!("error: {e:#}");
        }
    }

    Ok(())
}

fn cmd_build(cfg: &Config, cancel: &CancelToken) -> Result<()> {
    let mut args: Vec<String> = vec!["build".into(), "-t".into(), cfg.image.clone()];
    if let Some(dockerfile) = &cfg.dockerfile {
        args.push("-f".into());
        args.push(dockerfile.clone());
    }
    args.push(cfg.build_context.clone());

    let rx = docker::spawn(
        StreamCommand {
            args,
            timeout: cfg.docker_timeout(),
            log_path: None,
        },
        cancel.clone(),
    )?;

    for line in rx {
        match line {
            OutputLine::Stdout(l) => println!("{l}"),
            OutputLine::Stderr(l) => eprintln!("{l}"),
            OutputLine::Done(result) => {
                if result.cancelled {
                    bail!("build interrupted");
                }
                if result.timed_out {
                    bail!("build timed out after {}s", cfg.docker_timeout);
                }
                if !result.success {
                    let code = result
                        .exit_code
                        .map_or("?".to_string(), |c| c.to_string());
                    bail!("build failed (exit {code})");
                }
                println!("built {}", cfg.image);
            }
        }
    }
    Ok(())
}

fn cmd_start(mgr: &FleetManager<DockerCli, FsLogSink>, prompter: &mut StdinPrompter) -> Result<()> {
    let count = prompt::ask_number(prompter, "how many nodes? ")?;
    if count == 0 {
        println!("nothing to do");
        return Ok(());
    }

    let mut ids = Vec::with_capacity(count as usize);
    for i in 1..=count {
        ids.push(prompt::ask_node_id(
            prompter,
            &format!("node id for instance {i}/{count}: "),
        )?);
    }

    let entries = mgr.start_batch(&ids);
    for entry in &entries {
        match &entry.outcome {
            Ok(inst) => println!(
                "  slot {} -> node {} [{}]",
                inst.slot,
                entry.node_id,
                inst.status.as_str()
            ),
            Err(e) => println!("  node {}: {e}", entry.node_id),
        }
    }
    if entries.len() < ids.len() {
        println!(
            "batch stopped after {} of {} instances",
            entries.len(),
            ids.len()
        );
    }
    Ok(())
}

fn cmd_list(mgr: &FleetManager<DockerCli, FsLogSink>) -> Result<()> {
    let instances = mgr.list_instances()?;
    if instances.is_empty() {
        println!("no instances");
        return Ok(());
    }

    println!("{:<6} {:<24} {:<10} {:<9} log", "slot", "container", "node id", "status");
    for inst in &instances {
        let node_id = inst.node_id.map_or("?".to_string(), |id| id.to_string());
        let log = inst
            .log_path
            .as_ref()
            .map_or(String::new(), |p| p.display().to_string());
        println!(
            "{:<6} {:<24} {:<10} {:<9} {log}",
            inst.slot,
            inst.container,
            node_id,
            inst.status.as_str()
        );
    }
    Ok(())
}

fn cmd_logs(
    cfg: &Config,
    mgr: &FleetManager<DockerCli, FsLogSink>,
    prompter: &mut StdinPrompter,
    cancel: &CancelToken,
) -> Result<()> {
    let slot = prompt::ask_number(prompter, "slot: ")?;
    let Some(inst) = mgr.instance_at(slot)? else {
        bail!("no instance at slot {slot}");
    };

    let rx = docker::spawn(
        StreamCommand {
            args: vec![
                "logs".into(),
                "--tail".into(),
                cfg.logs_tail.to_string(),
                inst.container.clone(),
            ],
            timeout: cfg.docker_timeout(),
            // Tail output also lands in the node's append-only log file.
            log_path: inst.log_path.clone(),
        },
        cancel.clone(),
    )?;

    for line in rx {
        match line {
            OutputLine::Stdout(l) | OutputLine::Stderr(l) => println!("{l}"),
            OutputLine::Done(result) => {
                if !result.success && !result.cancelled {
                    bail!("could not read logs for {}", inst.container);
                }
            }
        }
    }
    Ok(())
}

fn cmd_restart(
    mgr: &FleetManager<DockerCli, FsLogSink>,
    prompter: &mut StdinPrompter,
    cancel: &CancelToken,
) -> Result<()> {
    let line = prompter.ask_line("slot number or `all`: ")?;
    let choice = line.trim().to_ascii_lowercase();

    if choice == "all" {
        let outcomes = mgr.restart_all(cancel)?;
        if outcomes.is_empty() {
            println!("no instances");
            return Ok(());
        }
        for o in &outcomes {
            let id = o.node_id.map_or("?".to_string(), |n| n.to_string());
            match &o.result {
                RestartResult::Restarted => println!("  slot {} (node {id}): restarted", o.slot),
                RestartResult::Recovered => {
                    println!("  slot {} (node {id}): recovered via stop+start", o.slot)
                }
                RestartResult::Failed(msg) => {
                    println!("  slot {} (node {id}): failed: {msg}", o.slot)
                }
            }
        }
        let failed = outcomes.iter().filter(|o| !o.result.is_ok()).count();
        if failed > 0 {
            println!("{failed} of {} restarts failed", outcomes.len());
        }
        return Ok(());
    }

    if choice.is_empty() || !choice.bytes().all(|b| b.is_ascii_digit()) {
        println!("expected a slot number or `all`");
        return Ok(());
    }
    let slot: u32 = choice.parse().context("slot number out of range")?;
    if mgr.instance_at(slot)?.is_none() {
        bail!("no instance at slot {slot}");
    }

    match mgr.restart(slot, cancel) {
        RestartResult::Restarted => println!("slot {slot}: restarted"),
        RestartResult::Recovered => println!("slot {slot}: recovered via stop+start"),
        RestartResult::Failed(msg) => bail!("restart of slot {slot} failed: {msg}"),
    }
    Ok(())
}

fn cmd_add_one(
    mgr: &FleetManager<DockerCli, FsLogSink>,
    prompter: &mut StdinPrompter,
) -> Result<()> {
    let node_id = prompt::ask_node_id(prompter, "node id: ")?;

    let policy = match mgr.check_conflict(node_id)? {
        Conflict::Free => ConflictPolicy::Skip,
        Conflict::InUse(slot) => {
            let answer = prompter.ask_line(&format!(
                "node id {node_id} is already in use by slot {slot}; replace it? [y/N] "
            ))?;
            if answer.trim().eq_ignore_ascii_case("y") {
                ConflictPolicy::Replace
            } else {
                println!("left existing instance untouched");
                return Ok(());
            }
        }
    };

    let inst = mgr.create_instance(node_id, policy)?;
    println!(
        "slot {} -> node {node_id} [{}]",
        inst.slot,
        inst.status.as_str()
    );
    Ok(())
}

fn cmd_stop_all(mgr: &FleetManager<DockerCli, FsLogSink>) -> Result<()> {
    let removed = mgr.stop_all()?;
    println!("removed {removed} instance(s)");
    Ok(())
}
