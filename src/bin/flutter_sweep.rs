use aeroela::{
    beam::Structure,
    gains::ReferenceState,
    io::{self, PersistedStateSpace, PersistedStructure},
    LinearAeroelastic, Settings, StateSpace,
};
use serde::Deserialize;
use simple_logger::SimpleLogger;
use std::error::Error;
use std::time::Instant;

struct Timer {
    time: Instant,
}
impl Timer {
    pub fn tic() -> Self {
        Self {
            time: Instant::now(),
        }
    }
    pub fn toc(self) -> f64 {
        self.time.elapsed().as_secs_f64()
    }
    pub fn print_toc(self) {
        println!("... in {:3}s", self.toc());
    }
}

/// Aeroelastic case
#[derive(Deserialize)]
struct Case {
    settings: Settings,
    uvlm: PersistedStateSpace,
    beam: PersistedStructure,
    reference: ReferenceState,
}

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::new().env().init()?;
    let args: Vec<String> = std::env::args().collect();
    let case_path = args.get(1).map_or("data/ttail_case.pkl", |s| s.as_str());
    let v_min: f64 = args.get(2).map_or(Ok(10.), |s| s.parse())?;
    let v_max: f64 = args.get(3).map_or(Ok(150.), |s| s.parse())?;
    let n_speed: usize = args.get(4).map_or(Ok(15), |s| s.parse())?;

    // CASE
    let tic = Timer::tic();
    println!("Loading case {} ...", case_path);
    let case: Case = io::read_pickle(case_path)?;
    case.settings.validate()?;
    let uvlm = StateSpace::try_from(case.uvlm)?;
    let structure = Structure::try_from(case.beam)?;
    tic.print_toc();

    // ASSEMBLY
    let tic = Timer::tic();
    println!("Assembling the aeroelastic system ...");
    let mut aeroelastic = LinearAeroelastic::builder()
        .settings(case.settings)
        .uvlm(uvlm)
        .structure(structure)
        .linearisation(case.reference)
        .build()?;
    let assembly = aeroelastic.assemble()?;
    for advisory in &assembly.advisories {
        println!("WARNING: {}", advisory);
    }
    println!("{}", assembly.value);
    let frequencies = aeroelastic.structure().frequencies();
    if !frequencies.is_empty() {
        println!(
            "Structural modes [Hz]: {:.3?}",
            frequencies
                .iter()
                .map(|omega| omega / (2. * std::f64::consts::PI))
                .collect::<Vec<f64>>()
        );
    }
    tic.print_toc();

    // SPEED SWEEP
    let tic = Timer::tic();
    let speeds: Vec<f64> = (0..n_speed)
        .map(|k| v_min + (v_max - v_min) * k as f64 / (n_speed.max(2) - 1) as f64)
        .collect();
    println!("Sweeping {} speeds in [{},{}]m/s ...", n_speed, v_min, v_max);
    let sweep = aeroelastic.sweep(&speeds)?;
    for point in &sweep {
        println!(
            " - {:8.3}m/s: spectral radius {:.6} {}",
            point.speed,
            point.spectral_radius,
            if point.is_stable() { "" } else { "(unstable)" }
        );
    }
    match sweep.iter().find(|point| !point.is_stable()) {
        Some(point) => println!("First unstable speed: {}m/s", point.speed),
        None => println!("Stable over the speed range"),
    }
    tic.print_toc();

    // OUTPUTS SAVING
    io::write_pickle(&sweep, "data/flutter_sweep.pkl")?;
    aeroelastic.save_uvlm("data/uvlm_projected.pkl")?;
    Ok(())
}
