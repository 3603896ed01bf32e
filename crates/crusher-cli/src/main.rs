use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crusher_engine::dsp::params::{parse_mix as parse_mix_value, STEPS_MAX, STEPS_MIN};
use crusher_engine::render::{render_file, RenderConfig};
use crusher_engine::{Assignment, CrusherParams, Engine, EngineConfig, ParamId, ParamSnapshot};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name="crusher", version, about="Bitcrusher with dry/wet mix and bypass")]
struct Cli {
    #[command(subcommand)]
    cmd: Command
}

#[derive(Subcommand)]
enum Command {
    /// List audio devices
    Devices,
    /// Print the parameter table
    Params,
    /// Crush live input to the output device
    Run(RunArgs),
    /// Crush a WAV file offline
    Render(RenderArgs),
}

#[derive(Args, Clone, Copy)]
struct ParamArgs {
    /// Quantization steps
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(STEPS_MIN as i64..=STEPS_MAX as i64))]
    steps: u32,
    /// Dry/wet mix, 0..1 or a percentage like 50%
    #[arg(long, default_value_t = 0.5, value_parser = parse_mix)]
    mix: f32,
    /// Start bypassed
    #[arg(long)]
    bypass: bool,
}

impl ParamArgs {
    fn snapshot(self) -> ParamSnapshot {
        ParamSnapshot { steps: self.steps, mix: self.mix, bypass: self.bypass }
    }
}

#[derive(Args)]
struct RunArgs {
    /// Input device (case-insensitive substring)
    #[arg(long)]
    input: Option<String>,
    /// Output device (case-insensitive substring)
    #[arg(long)]
    output: Option<String>,
    /// Input device index from `crusher devices`
    #[arg(long)]
    input_index: Option<usize>,
    /// Output device index from `crusher devices`
    #[arg(long)]
    output_index: Option<usize>,
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Frames per buffer
    #[arg(long)]
    block_size: Option<u32>,
    #[command(flatten)]
    params: ParamArgs,
}

#[derive(Args)]
struct RenderArgs {
    input: PathBuf,
    output: PathBuf,
    /// Frames per processing call
    #[arg(long, default_value_t = 512)]
    block_size: usize,
    /// Widen the output; extra channels are silent
    #[arg(long)]
    output_channels: Option<u16>,
    #[command(flatten)]
    params: ParamArgs,
}

fn parse_mix(s: &str) -> std::result::Result<f32, String> {
    let v = parse_mix_value(s).map_err(|e| e.to_string())?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("mix must be within 0..=1 (or 0%..=100%), got {s}"))
    }
}

fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Devices => crusher_engine::devices::print_devices().context("listing devices"),
        Command::Params => {
            print_params();
            Ok(())
        }
        Command::Run(args) => run(args),
        Command::Render(args) => render(args),
    }
}

fn print_params() {
    println!("{:<8} {:<12} {:>6} {:>6} {:>8}", "name", "label", "min", "max", "default");
    for id in ParamId::ALL {
        let (lo, hi) = id.range();
        println!(
            "{:<8} {:<12} {:>6} {:>6} {:>8}",
            id.name(),
            id.label(),
            id.format_value(lo),
            id.format_value(hi),
            id.format_value(id.default_value()),
        );
    }
}

fn describe(p: &CrusherParams) -> String {
    ParamId::ALL
        .into_iter()
        .map(|id| format!("{}={}", id, p.display(id)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn run(args: RunArgs) -> Result<()> {
    let cfg = EngineConfig {
        input_name: args.input,
        output_name: args.output,
        input_index: args.input_index,
        output_index: args.output_index,
        sample_rate: args.sample_rate,
        block_size: args.block_size,
        params: args.params.snapshot(),
    };
    let mut eng = Engine::new(cfg);
    eng.start().context("starting audio engine")?;

    let params = eng.params();
    let status = eng.status();
    println!("running: {}", describe(&params));
    println!("type name=value (steps, mix, bypass), `status`, or `quit`");

    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if let Some(err) = status.take_error() {
            eprintln!("stream error: {err}");
        }
        match line {
            "" => continue,
            "q" | "quit" | "exit" => break,
            "status" => {
                println!(
                    "{} underruns={} overruns={}",
                    describe(&params),
                    status.underruns(),
                    status.overruns()
                );
            }
            cmd => match cmd.parse::<Assignment>() {
                Ok(a) => {
                    params.apply(&a);
                    tracing::debug!(param = %a.id, value = a.value, "parameter changed");
                    println!("{}", describe(&params));
                }
                Err(err) => eprintln!("{err}"),
            },
        }
    }

    eng.stop();
    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    let cfg = RenderConfig {
        params: args.params.snapshot(),
        block_size: args.block_size,
        output_channels: args.output_channels,
    };
    let report = render_file(&args.input, &args.output, &cfg)
        .with_context(|| format!("rendering {}", args.input.display()))?;
    println!(
        "wrote {} ({} frames, {} -> {} ch, {} Hz, peak {:.3} -> {:.3})",
        args.output.display(),
        report.frames,
        report.input_channels,
        report.output_channels,
        report.sample_rate,
        report.peak_in,
        report.peak_out,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from(["crusher", "run", "--steps", "8", "--mix", "0.25", "--bypass"]).unwrap();
        let Command::Run(args) = cli.cmd else { panic!("expected run") };
        assert_eq!(args.params.snapshot(), ParamSnapshot { steps: 8, mix: 0.25, bypass: true });
    }

    #[test]
    fn render_defaults() {
        let cli = Cli::try_parse_from(["crusher", "render", "a.wav", "b.wav"]).unwrap();
        let Command::Render(args) = cli.cmd else { panic!("expected render") };
        assert_eq!(args.block_size, 512);
        assert_eq!(args.output_channels, None);
        assert_eq!(args.params.snapshot(), ParamSnapshot::default());
    }

    #[test]
    fn mix_accepts_percent() {
        let cli = Cli::try_parse_from(["crusher", "run", "--mix", "75%"]).unwrap();
        let Command::Run(args) = cli.cmd else { panic!("expected run") };
        assert_eq!(args.params.mix, 0.75);
    }

    #[test]
    fn out_of_range_values_rejected() {
        assert!(Cli::try_parse_from(["crusher", "run", "--steps", "0"]).is_err());
        assert!(Cli::try_parse_from(["crusher", "run", "--steps", "33"]).is_err());
        assert!(Cli::try_parse_from(["crusher", "run", "--mix", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["crusher", "run", "--mix", "150%"]).is_err());
    }

    #[test]
    fn describe_formats_params() {
        let p = CrusherParams::new(ParamSnapshot { steps: 4, mix: 0.3, bypass: true });
        assert_eq!(describe(&p), "steps=4 mix=30% bypass=on");
    }
}
