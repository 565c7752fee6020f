//! Render a row of sheared galaxy x PSF postage stamps in parallel.
//!
//! Stamp `i` uses seed `seed + i`, so rerunning with the same arguments
//! reproduces every stamp exactly.

use clap::Parser;
use log::{info, warn};
use sbprofile::image::GaussianNoise;
use sbprofile::profile::{Convolution, Kolmogorov, Profile, Sersic};
use sbprofile::render::{draw, draw_shoot, DrawOptions, Method, ShootOptions};
use sbprofile::{render_stamps, BoxProfile, GsParams, ImageD, Sensor, Shear};

/// Command line arguments for the stamp renderer
#[derive(Parser, Debug)]
#[command(version, about = "Render galaxy postage stamps through a seeing PSF")]
struct Args {
    /// Number of stamps; the shear angle rotates across the row
    #[arg(long, default_value_t = 8)]
    count: usize,

    /// Stamp side in pixels
    #[arg(long, default_value_t = 48)]
    size: usize,

    /// Pixel scale in arcsec
    #[arg(long, default_value_t = 0.2)]
    scale: f64,

    /// Sersic index of the galaxy
    #[arg(long, default_value_t = 1.5)]
    sersic_n: f64,

    /// Galaxy half-light radius in arcsec
    #[arg(long, default_value_t = 0.8)]
    hlr: f64,

    /// Galaxy flux
    #[arg(long, default_value_t = 1.0e4)]
    flux: f64,

    /// Reduced shear magnitude
    #[arg(long, default_value_t = 0.2)]
    shear: f64,

    /// Kolmogorov PSF FWHM in arcsec
    #[arg(long, default_value_t = 0.7)]
    psf_fwhm: f64,

    /// Shoot this many photons instead of drawing with FFT
    #[arg(long)]
    photons: Option<usize>,

    /// Charge diffusion sigma in pixels when shooting photons
    #[arg(long, default_value_t = 0.0)]
    diffusion: f64,

    /// Brighter-fatter boundary shift in pixels per unit of flux difference
    #[arg(long, default_value_t = 0.0)]
    brighter_fatter: f64,

    /// Gaussian read noise sigma added to each stamp
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// JSON file with accuracy settings
    #[arg(long)]
    gsparams: Option<std::path::PathBuf>,

    /// Base random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn build_profile(args: &Args, index: usize, gsparams: &GsParams, with_pixel: bool) -> sbprofile::Result<Profile> {
    let beta = std::f64::consts::PI * index as f64 / args.count.max(1) as f64;
    let galaxy: Profile = Sersic::with_half_light_radius(args.sersic_n, args.hlr, args.flux)?
        .with_gsparams(gsparams.clone())?
        .into();
    let galaxy = galaxy.shear(&Shear::from_polar(args.shear, beta)?)?;
    let psf: Profile = Kolmogorov::with_fwhm(args.psf_fwhm, 1.0)?
        .with_gsparams(gsparams.clone())?
        .into();
    let mut items = vec![galaxy, psf];
    if with_pixel {
        items.push(BoxProfile::pixel(args.scale, 1.0)?.into());
    }
    Ok(Convolution::new(items, None)?.into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let gsparams = match &args.gsparams {
        Some(path) => GsParams::from_json(&std::fs::read_to_string(path)?)?,
        None => GsParams::default(),
    };
    gsparams.validate()?;
    let sensor = if args.diffusion > 0.0 || args.brighter_fatter > 0.0 {
        Some(Sensor::new(args.diffusion, args.brighter_fatter)?)
    } else {
        None
    };

    info!(
        "rendering {} stamps of {}x{} pixels at {}\"/pixel",
        args.count, args.size, args.size, args.scale
    );

    let stamps = render_stamps(args.count, args.seed, |i, rng| {
        let mut image = ImageD::from_size(args.size, args.size, args.scale)?;
        let report = match args.photons {
            Some(n) => {
                let profile = build_profile(&args, i, &gsparams, false)?;
                let opts = ShootOptions {
                    n_photons: Some(n),
                    sensor,
                    ..ShootOptions::default()
                };
                draw_shoot(&profile, &mut image, &opts, rng)?
            }
            None => {
                let profile = build_profile(&args, i, &gsparams, true)?;
                let opts = DrawOptions {
                    method: Method::Fft,
                    ..DrawOptions::default()
                };
                draw(&profile, &mut image, &opts)?
            }
        };
        if args.noise > 0.0 {
            image.add_noise(&GaussianNoise::new(args.noise)?, rng)?;
        }
        Ok((image, report))
    })?;

    for (i, (image, report)) in stamps.iter().enumerate() {
        for w in &report.warnings {
            warn!("stamp {i}: {w}");
        }
        info!(
            "stamp {i}: drawn flux {:.2}, image sum {:.2}, peak {:.3}",
            report.added_flux,
            image.sum(),
            image.max()
        );
    }
    println!("rendered {} stamps", stamps.len());
    Ok(())
}
