//! Raw USB transport for Epson printers.
//!
//! [`UsbPrinter`] implements [`std::io::Write`], so it can be handed straight
//! to a [`Job`](crate::Job) in place of a file or a CUPS backend pipe.

use log::{debug, info};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};
use std::io;
use std::time::Duration;

use crate::error::Error;

pub const EPSON_VENDOR_ID: u16 = 0x04B8;

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    config: u8,
    iface: u8,
    setting: u8,
    address: u8,
}

pub struct UsbPrinter {
    handle: Box<DeviceHandle<Context>>,
    endpoint_out: Endpoint,
    timeout: Duration,
}

impl UsbPrinter {
    /// Open the Epson printer with `product_id`, optionally matching `serial`.
    pub fn open(product_id: u16, serial: Option<&str>) -> Result<Self, Error> {
        let mut context = Context::new()?;

        let (device, device_desc, handle) =
            match Self::open_device(&mut context, EPSON_VENDOR_ID, product_id, serial) {
                Ok(found) => found,
                Err(err) => {
                    debug!("{:?}", err);
                    return Err(Error::DeviceOffline);
                }
            };

        let endpoint_out =
            Self::find_endpoint(&device, &device_desc, Direction::Out, TransferType::Bulk)
                .ok_or(Error::MissingEndpoint)?;

        // Printer class devices are usually bound to usblp
        handle.set_auto_detach_kernel_driver(true)?;
        let has_kernel_driver = matches!(handle.kernel_driver_active(endpoint_out.iface), Ok(true));
        info!("Kernel driver active: {}", has_kernel_driver);

        handle.set_active_configuration(endpoint_out.config)?;
        handle.claim_interface(endpoint_out.iface)?;
        handle.set_alternate_setting(endpoint_out.iface, endpoint_out.setting)?;

        Ok(UsbPrinter {
            handle: Box::new(handle),
            endpoint_out,
            timeout: Duration::from_secs(10),
        })
    }

    /// Bulk transfer timeout, 10 seconds by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn open_device(
        context: &mut Context,
        vid: u16,
        pid: u16,
        serial: Option<&str>,
    ) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>), Error> {
        let devices = context.devices()?;

        if devices.is_empty() {
            debug!("Failed to read device list");
            return Err(Error::DeviceListNotReadable);
        }

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() != vid || device_desc.product_id() != pid {
                continue;
            }

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    debug!("Failed to open device: {:?}", err);
                    continue;
                }
            };

            let serial = match serial {
                Some(serial) => serial,
                None => return Ok((device, device_desc, handle)),
            };

            let timeout = Duration::from_secs(1);
            let languages = handle.read_languages(timeout)?;
            let language = match languages.first() {
                Some(language) => *language,
                None => continue,
            };

            match handle.read_serial_number_string(language, &device_desc, timeout) {
                Ok(s) if s == serial => return Ok((device, device_desc, handle)),
                Ok(_) => continue,
                Err(err) => {
                    debug!("Failed to read serial number string: {:?}", err);
                    continue;
                }
            }
        }

        debug!("No device matches {:04x}:{:04x} {:?}", vid, pid, serial);
        Err(Error::DeviceOffline)
    }

    fn find_endpoint(
        device: &Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == transfer_type
                        {
                            return Some(Endpoint {
                                config: config_desc.number(),
                                iface: interface_desc.interface_number(),
                                setting: interface_desc.setting_number(),
                                address: endpoint_desc.address(),
                            });
                        }
                    }
                }
            }
        }
        None
    }

    /// Send `buf` in one bulk transfer.
    pub fn send(&self, buf: &[u8]) -> Result<usize, Error> {
        let n = self
            .handle
            .write_bulk(self.endpoint_out.address, buf, self.timeout)?;

        if n == buf.len() {
            Ok(n)
        } else {
            debug!(
                "write error: bytes wrote {} != bytes supplied {}, possibly timeout ?",
                n,
                buf.len()
            );
            Err(Error::InvalidResponse(n))
        }
    }
}

impl io::Write for UsbPrinter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf).map_err(into_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UsbPrinter {
    fn drop(&mut self) {
        if let Err(err) = self.handle.release_interface(self.endpoint_out.iface) {
            debug!("Failed to release interface: {:?}", err);
        }
    }
}

fn into_io_error(err: Error) -> io::Error {
    match err {
        Error::Io(err) => err,
        Error::UsbError(rusb::Error::Timeout) | Error::InvalidResponse(_) => {
            io::Error::new(io::ErrorKind::TimedOut, err)
        }
        Error::UsbError(rusb::Error::NoDevice) | Error::DeviceOffline => {
            io::Error::new(io::ErrorKind::NotConnected, err)
        }
        err => io::Error::new(io::ErrorKind::Other, err),
    }
}
