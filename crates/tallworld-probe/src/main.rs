use std::env;
use std::process::ExitCode;
use tallworld_common::{CubeCoord, Result, TallWorldError};
use tallworld_logger::{init_from_env, log, LogSeverity::*};
use tallworld_world::{MaterialTable, WorldConfig, WorldHandle};

const USAGE: &str = "usage: twprobe <world_dir> [config.json] [cx cy cz]";

struct Args {
    world_dir: String,
    config: WorldConfig,
    coord: CubeCoord,
}

fn parse_args(mut args: Vec<String>) -> Result<Args> {
    if args.is_empty() || args.len() > 5 {
        return Err(TallWorldError::Config(USAGE.to_owned()));
    }
    let world_dir = args.remove(0);
    let config = if args.len() % 3 == 1 {
        WorldConfig::from_json_file(args.remove(0))?
    } else {
        WorldConfig::default()
    };
    let coord = match args.as_slice() {
        [] => CubeCoord::new(-7, -4, -6),
        [cx, cy, cz] => {
            let parse = |s: &String| {
                s.parse::<i32>()
                    .map_err(|e| TallWorldError::Config(format!("Bad coordinate {}: {}", s, e)))
            };
            CubeCoord::new(parse(cx)?, parse(cy)?, parse(cz)?)
        }
        _ => return Err(TallWorldError::Config(USAGE.to_owned())),
    };
    Ok(Args {
        world_dir,
        config,
        coord,
    })
}

fn probe(args: Args) -> Result<()> {
    let mut world = WorldHandle::open(&args.world_dir, args.config)?;
    let coord = args.coord;

    let summary = {
        let cube = world.get_cube(coord.cx, coord.cy, coord.cz)?;
        if cube.is_generated() {
            let solid = cube.blocks().iter().filter(|&&id| id != 0).count();
            let top = cube.height_map().iter().copied().max().unwrap_or(0);
            let most_common = most_common_block(cube.blocks());
            format!(
                "cube {}: {} solid blocks, highest opaque layer {}, mostly {}",
                coord,
                solid,
                top,
                MaterialTable::name(most_common).unwrap_or("unknown")
            )
        } else {
            format!("cube {}: not generated", coord)
        }
    };
    println!("{}", summary);

    let column = coord.column();
    match world.get_column(column.cx, column.cz)? {
        Some(_) => println!("column {}: present", column),
        None => println!("column {}: not generated", column),
    }

    world.close()
}

fn most_common_block(blocks: &[u16]) -> u16 {
    let mut counts = vec![0usize; 4096];
    for &id in blocks {
        if let Some(count) = counts.get_mut(id as usize) {
            *count += 1;
        }
    }
    counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, count)| *count)
        .map(|(id, _)| id as u16)
        .unwrap_or(0)
}

fn main() -> ExitCode {
    init_from_env();
    log("twprobe init".to_owned(), Debug);

    let result = parse_args(env::args().skip(1).collect()).and_then(probe);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log(err.to_string(), Error);
            ExitCode::FAILURE
        }
    }
}
