use clap::Parser as ClapParser;
use std::process;

use kette_runtime::{
    Context, ContextCreateInfo, Error, PAGE_SIZE, SlotKind, Value,
};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data stack size in cells
    #[arg(long, default_value_t = 4096)]
    data_stack: usize,

    /// Retain stack size in cells
    #[arg(long, default_value_t = 4096)]
    retain_stack: usize,

    /// Call stack size in cells
    #[arg(long, default_value_t = 4096)]
    call_stack: usize,

    /// Initial code buffer size in bytes
    #[arg(long, default_value_t = PAGE_SIZE)]
    code_size: usize,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Skip emitting and calling machine code
    #[arg(long)]
    no_jit: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter),
    )
    .init();

    let info = ContextCreateInfo {
        data_stack_size: cli.data_stack,
        retain_stack_size: cli.retain_stack,
        call_stack_size: cli.call_stack,
        code_size: cli.code_size,
    };

    if let Err(err) = run(&info, !cli.no_jit) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(info: &ContextCreateInfo, jit: bool) -> Result<(), Error> {
    let mut ctx = Context::new(info)?;

    let point = ctx.define_map(
        "point",
        &[("x", SlotKind::Value), ("y", SlotKind::Value)],
    )?;
    let p = ctx.new_object(point)?;
    ctx.set_property_named(p, "x", Value::fixnum(10))?;
    ctx.set_property_named(p, "y", Value::fixnum(20))?;
    println!("{}", ctx.render(p));

    let q = ctx.instantiate(p)?;
    ctx.set_property_named(q, "x", Value::fixnum(-3))?;
    println!("{}", ctx.render(p));
    println!("{}", ctx.render(q));

    let named = ctx.define_map(
        "named-point",
        &[("point", SlotKind::Parent), ("name", SlotKind::Value)],
    )?;
    let n = ctx.new_object(named)?;
    ctx.set_parent_named(n, "point", p)?;
    ctx.set_property_named(n, "name", Value::fixnum(7))?;
    let x = ctx.get_property_named(n, "x")?;
    println!("{}", ctx.render(n));
    println!("inherited x = {x}");

    for i in 1..=3 {
        ctx.data_stack.push(Value::fixnum(i));
    }
    ctx.data_to_retain()?;
    println!(
        "data: {:?} retain: {:?}",
        ctx.data_stack.as_slice(),
        ctx.retain_stack.as_slice()
    );
    ctx.retain_to_data()?;

    if jit {
        run_native(&mut ctx);
    }
    Ok(())
}

#[cfg(target_arch = "x86_64")]
fn run_native(ctx: &mut Context) {
    const ANSWER: u32 = 42;
    ctx.code.clear();
    // mov eax, imm32
    ctx.code.push(0xB8);
    ctx.code.push_span(&ANSWER.to_le_bytes());
    // ret
    ctx.code.push(0xC3);
    log::debug!("emitted {:02x?}", ctx.code.span());

    // SAFETY: the buffer holds a complete `mov eax, imm32; ret`
    let result = unsafe { (ctx.code.as_callable())() };
    println!("native code returned {}", result as i32);
}

#[cfg(not(target_arch = "x86_64"))]
fn run_native(_ctx: &mut Context) {
    log::warn!("no code emitter for this architecture, skipping native call");
}
