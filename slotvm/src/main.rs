use clap::{Parser as ClapParser, ValueEnum};
use env_logger::Env;

use slotvm::{
    CodeContext, ObjectLiteral, Scheduler, SchedulerConfig, SendType, SlotType, VMCreateInfo,
    VmError,
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Demo {
    /// (| add = (|| 1 + 1) |) add
    Add,
    /// primitives interpreter halt: 'bye'
    Halt,
    /// primitives interpreter error: 'oops'
    Error,
    /// a handler resuming `1 + (error: 'Test')` with 1
    Resume,
}

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Demo programs to run side by side, all of them by default
    #[arg(long, value_enum)]
    demo: Vec<Demo>,

    /// Instructions per scheduler turn, 0 runs each process to completion
    #[arg(long, default_value_t = SchedulerConfig::default().quantum)]
    quantum: usize,

    /// Frame depth limit of every process
    #[arg(long, default_value_t = SchedulerConfig::default().max_frames)]
    max_frames: usize,

    /// Log sends and activations
    #[arg(long, short)]
    verbose: bool,

    /// Print the bytecode of each demo before running it
    #[arg(long)]
    dump_bytecode: bool,
}

fn send(code: &mut CodeContext, selector: &str, kind: SendType, count: u8) -> Result<(), VmError> {
    code.push_str(selector)?;
    code.send(kind, count);
    Ok(())
}

/// Pushes `primitives interpreter`.
fn interpreter(code: &mut CodeContext) -> Result<(), VmError> {
    code.push_self();
    send(code, "primitives", SendType::Unary, 0)?;
    send(code, "interpreter", SendType::Unary, 0)
}

fn add() -> Result<CodeContext, VmError> {
    let mut body = CodeContext::new();
    body.push_int(1)?;
    body.push_int(1)?;
    send(&mut body, "+", SendType::Binary, 1)?;

    let mut code = CodeContext::new();
    code.push_object(ObjectLiteral::plain())?;
    code.push_str("add")?;
    code.push_object(ObjectLiteral::method(body, &[]))?;
    code.add_slot(SlotType::Normal);
    send(&mut code, "add", SendType::Unary, 0)?;
    Ok(code)
}

fn interpreter_call(selector: &str, text: &str) -> Result<CodeContext, VmError> {
    let mut code = CodeContext::new();
    interpreter(&mut code)?;
    code.push_str(text)?;
    send(&mut code, selector, SendType::Keyword, 1)?;
    Ok(code)
}

fn resume() -> Result<CodeContext, VmError> {
    let mut handler = CodeContext::new();
    interpreter(&mut handler)?;
    handler.push_self();
    send(&mut handler, "err", SendType::Unary, 0)?;
    handler.push_int(1)?;
    send(&mut handler, "restoreProcess:With:", SendType::Keyword, 2)?;

    let mut code = CodeContext::new();
    interpreter(&mut code)?;
    code.push_object(ObjectLiteral::block(handler, &["msg", "err"]))?;
    send(&mut code, "setErrorHandler:", SendType::Keyword, 1)?;
    code.pop();

    code.push_int(1)?;
    interpreter(&mut code)?;
    code.push_str("Test")?;
    send(&mut code, "error:", SendType::Keyword, 1)?;
    send(&mut code, "+", SendType::Binary, 1)?;
    Ok(code)
}

fn build(demo: Demo) -> Result<CodeContext, VmError> {
    match demo {
        Demo::Add => add(),
        Demo::Halt => interpreter_call("halt:", "bye"),
        Demo::Error => interpreter_call("error:", "oops"),
        Demo::Resume => resume(),
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let created = Scheduler::new(VMCreateInfo {
        scheduler: SchedulerConfig {
            quantum: cli.quantum,
            max_frames: cli.max_frames,
        },
        ..Default::default()
    });
    let mut scheduler = match created {
        Ok(scheduler) => scheduler,
        Err(err) => {
            eprintln!("Error starting the VM: {err}");
            std::process::exit(1);
        }
    };

    let demos = if cli.demo.is_empty() {
        Demo::value_variants().to_vec()
    } else {
        cli.demo.clone()
    };

    let mut handles = Vec::new();
    for demo in demos {
        let mut code = match build(demo) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("Error assembling {demo:?}: {err}");
                std::process::exit(1);
            }
        };
        if cli.dump_bytecode {
            code.finalize();
            println!("== {demo:?} ==");
            print!("{}", code.disassemble());
        }
        handles.push((demo, scheduler.add_process(code)));
    }

    scheduler.interpret();

    for (demo, handle) in handles {
        let status = handle.status();
        let state = match (status.finished, status.finished_with_error) {
            (false, _) => "unfinished",
            (true, false) => "ok",
            (true, true) => "error",
        };
        println!(
            "{demo:?}: {state} {}",
            status.display.as_deref().unwrap_or("-")
        );
    }
}
