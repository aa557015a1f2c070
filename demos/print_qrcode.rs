use escpx::{pack_pixels, packed_len, Config, Job, ModelFlags, PageHeader, Scanline, UsbPrinter};
use qrcode::QrCode;
use std::env;
use std::io::Write;
//
// cargo run --example print_qrcode [direct|weave|color] [output.prn]
//
// Set PRINTER_PID (and optionally PRINTER_SERIAL) in .env to print over USB
// instead of writing a file.
//

#[derive(Debug, PartialEq)]
enum PrintOption {
    Direct,
    Weave,
    Color,
}

impl PrintOption {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" | "360" => Some(Self::Direct),
            "weave" | "softweave" | "720" => Some(Self::Weave),
            "color" | "cmyk" => Some(Self::Color),
            _ => None,
        }
    }
}

fn print_usage() {
    println!("Usage: cargo run --example print_qrcode [OPTION] [FILE]");
    println!("Options:");
    println!("  direct     Black only, 360 dpi, one line per pass");
    println!("  weave      Black only, 720 dpi, 32 nozzle softweave");
    println!("  color      CMYK, 720 dpi, staggered softweave");
    println!("\nIf no option is provided, 'weave' is used as default.");
}

/// Page width in pixels for an 8 inch print area.
fn page_width(dpi: u32) -> u32 {
    8 * dpi
}

/// Render a QR code and turn it into scanlines for `planes` planes, with the
/// code in the last (black) plane.
fn render(text: &str, width: u32, size: u32, planes: usize) -> Vec<Scanline> {
    let code = QrCode::new(text).unwrap();
    let image = code
        .render::<image::Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(size, size)
        .build();

    let line_bytes = packed_len(width as usize, 1);
    let mut pixels = vec![0u8; width as usize];

    image
        .rows()
        .map(|row| {
            for (dot, pixel) in pixels.iter_mut().zip(row) {
                *dot = (pixel[0] < 128) as u8;
            }

            let mut scanline = vec![vec![0u8; line_bytes]; planes];
            if let Some(black) = scanline.last_mut() {
                pack_pixels(&pixels, 1, 0, 1, width as usize, black);
            }
            scanline
        })
        .collect()
}

fn main() {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();

    let args: Vec<String> = env::args().collect();

    let option = match args.get(1) {
        Some(arg) if arg == "--help" || arg == "-h" => {
            print_usage();
            return;
        }
        Some(arg) => match PrintOption::from_str(arg) {
            Some(opt) => opt,
            None => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage();
                return;
            }
        },
        None => PrintOption::Weave,
    };

    println!("Running with option: {:?}", option);

    let (config, header, planes) = match option {
        PrintOption::Direct => {
            let config = Config::new(ModelFlags::ESCK | ModelFlags::USB, 1);
            let header = PageHeader::new([360, 360], page_width(360), 0).page_size(612, 792);
            (config, header, 1)
        }
        PrintOption::Weave => {
            let config = Config::new(ModelFlags::ESCK | ModelFlags::USB, 1).direction(1);
            let header = PageHeader::new([720, 720], page_width(720), 0)
                .page_size(612, 792)
                .weave(32, 0, 8)
                .compression(1);
            (config, header, 1)
        }
        PrintOption::Color => {
            let config = Config::new(
                ModelFlags::ESCK | ModelFlags::USB | ModelFlags::STAGGER | ModelFlags::EXT_UNITS,
                4,
            )
            .head_offsets([0, 0, 0, 48])
            .microweave(0);
            let header = PageHeader::new([720, 720], page_width(720), 0)
                .page_size(612, 792)
                .weave(48, 0, 6)
                .compression(1);
            (config, header, 4)
        }
    };

    let scanlines = render(
        "https://www.cups.org/",
        header.width,
        header.resolution[1] * 2,
        planes,
    );
    let header = PageHeader {
        height: scanlines.len() as u32,
        ..header
    };

    let out: Box<dyn Write> = match env::var("PRINTER_PID") {
        Ok(pid) => {
            let pid = u16::from_str_radix(pid.trim_start_matches("0x"), 16).unwrap();
            let serial = env::var("PRINTER_SERIAL").ok();
            match UsbPrinter::open(pid, serial.as_deref()) {
                Ok(printer) => Box::new(printer),
                Err(err) => panic!("Failed to open printer: {}", err),
            }
        }
        Err(_) => {
            let path = args.get(2).map(String::as_str).unwrap_or("qrcode.prn");
            Box::new(std::fs::File::create(path).unwrap())
        }
    };

    let mut job = Job::new(out, config).unwrap();
    match job.print_page(&header, scanlines) {
        Ok(stats) => println!("Printed page: {:?}", stats),
        Err(err) => println!("ERROR {:#?}", err),
    }
    job.finish().unwrap();
}
