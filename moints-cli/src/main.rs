use std::{fs::File, io::BufReader, path::PathBuf, time::Instant};

use anyhow::{ensure, Context};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use clap::{Parser, Subcommand};
use moints::{
    config::ConfigJellium,
    integrals::{boys, cfour::ONE_ELECTRON_PRODUCTS, read_one_electron_integrals, BoysTable},
    jellium::{self, JelliumSystem},
    tensor::{BlockKey, MemoryStore},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the jellium model and its two-electron operator
    #[command(name = "jellium")]
    Jellium {
        /// A json file with radius, num_electrons, num_orbitals and optionally dimension
        #[arg(long, short)]
        config: PathBuf,
        /// Where to write a json summary of every populated block
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Read overlap, kinetic and one-electron hamiltonian integrals from a CFOUR IIII file
    #[command(name = "one-electron")]
    OneElectron {
        /// Path to the IIII file
        #[arg(long, short)]
        integrals: PathBuf,
        /// The number of orbitals the file was written for
        #[arg(long, short = 'n')]
        orbitals: usize,
        /// The file was written on a big-endian machine
        #[arg(long)]
        big_endian: bool,
    },
    /// Evaluate the Boys function F_0(T)..F_n(T)
    #[command(name = "boys")]
    Boys {
        /// The highest order n
        #[arg(long, short)]
        order: usize,
        /// The argument T
        #[arg(long, short)]
        argument: f64,
    },
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args: Args = Args::parse();

    match args.command {
        Command::Jellium { config, output } => {
            let system = JelliumSystem::try_from(ConfigJellium::load(&config)?)?;
            log::info!(
                "{} electrons in {} orbitals at rs = {} from {}",
                system.n_electrons(),
                system.n_orbitals(),
                system.radius(),
                config.display()
            );

            let start = Instant::now();
            let mut store = MemoryStore::new();
            let result = jellium::run(system, &mut store)?;

            println!(
                "populated {} blocks in {:0.2?}",
                store.len(),
                start.elapsed()
            );
            println!(
                "{} occupied and {} virtual orbitals",
                result.n_occupied, result.n_virtual
            );
            println!("reference energy: {:.15}", result.energy);
            println!("orbital energies: {:3.6?}", result.orbital_energies);

            if let Some(output) = output {
                let summary = serde_json::json!({
                    "jellium": result,
                    "blocks": store.summary(),
                });
                let file = File::create(&output)
                    .with_context(|| format!("creating {}", output.display()))?;
                serde_json::to_writer_pretty(file, &summary)?;
            }
        }

        Command::OneElectron {
            integrals,
            orbitals,
            big_endian,
        } => {
            if big_endian {
                one_electron::<BigEndian>(integrals, orbitals)?;
            } else {
                one_electron::<LittleEndian>(integrals, orbitals)?;
            }
        }

        Command::Boys { order, argument } => {
            ensure!(
                order <= boys::MAX_ORDER,
                "orders above {} are not supported",
                boys::MAX_ORDER
            );
            ensure!(
                argument >= 0.0,
                "the Boys function is evaluated for non-negative arguments only"
            );

            let table = BoysTable::new();
            let recursive = (order <= boys::MAX_RECURSIVE_ORDER)
                .then(|| table.fm_recursive(argument, order));

            for m in 0..=order {
                let direct = boys::fm(argument, m);
                match &recursive {
                    Some(values) => println!(
                        "F_{m}({argument}) = {:.16e} (series {direct:.16e})",
                        values[m]
                    ),
                    None => println!("F_{m}({argument}) = {direct:.16e}"),
                }
            }
        }
    }

    Ok(())
}

fn one_electron<B: ByteOrder>(path: PathBuf, orbitals: usize) -> anyhow::Result<()> {
    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;

    let mut store = MemoryStore::new();
    let summary =
        read_one_electron_integrals::<_, B, _>(BufReader::new(file), orbitals, &mut store)?;

    println!(
        "read {} integrals from {} sections",
        summary.integrals,
        summary.sections.len()
    );
    if summary.truncated {
        println!("warning: the file is truncated");
    }

    for class in ONE_ELECTRON_PRODUCTS {
        let key = BlockKey::spatial(class);
        if let Some(matrix) = store.matrix(&key) {
            println!("{}:{matrix:.8}", class.name());
        }
    }

    Ok(())
}
