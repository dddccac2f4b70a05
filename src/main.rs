mod cli;
mod config;
mod device;
mod emitter;
mod ipc;
mod logging;
mod motion;
mod packet;
mod ps2;
mod session;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
