use escpx::{Config, Job, ModelFlags, RemoteMode, UsbPrinter};
use std::env;
//
// cargo run --example usb_reset 0x0890
//
// Takes the printer out of packet mode and resets it. PRINTER_SERIAL in .env
// selects one printer when several of the same model are attached.
//

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let pid = match env::args().nth(1).or_else(|| env::var("PRINTER_PID").ok()) {
        Some(pid) => u16::from_str_radix(pid.trim_start_matches("0x"), 16).unwrap(),
        None => {
            println!("usage: usb_reset <product-id-in-hex>");
            return;
        }
    };
    let serial = env::var("PRINTER_SERIAL").ok();

    let config = Config::new(ModelFlags::USB | ModelFlags::REMOTE, 1).remote(RemoteMode::default());

    match UsbPrinter::open(pid, serial.as_deref()) {
        Ok(printer) => match Job::new(printer, config).and_then(|job| job.finish()) {
            Ok(_) => {
                println!("reset success");
            }
            Err(err) => {
                println!("reset failed {:?}", err);
            }
        },
        Err(err) => panic!("Failed to open printer {:04x}: {}", pid, err),
    }
}
