mod cli;
mod commands;
mod env_loader;
mod error;
mod gdrive;
mod harvest;
mod logging;
mod portal;

fn main() {
    env_loader::load_dotenv();

    if let Err(err) = cli::run() {
        match err.downcast_ref::<error::HarvestError>() {
            Some(harvest_err) => eprintln!("error[{}]: {err:#}", harvest_err.code().as_str()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}
