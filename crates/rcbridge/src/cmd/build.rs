use crate::cmd::{load_channels, parse_sets, BuildArgs};
use crate::exit::{validation_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: BuildArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = load_channels(&args.channels.channels)?;
    let values = parse_sets(&args.channels.set)?;
    let packet = channels
        .build_packet(&values)
        .map_err(|err| validation_error("packet build failed", err))?;
    print_packet(&packet, format);
    Ok(SUCCESS)
}
