//! Transports for integrator packets.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use ft_protocol::{
    FT_FRAME_HEADER_SIZE, FT_MIN_PACKET_SIZE, FT_P_TYPE_FRAME, FT_P_TYPE_SYNC, FTFrameHeader,
    FTHeader,
};

/// Packet pipe to the peripheral.
pub trait HardwareLink: Send {
    /// Write one packet. The slice is exactly the bytes to put on the wire.
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Read one packet into `buf`, waiting at most `timeout`. Returns the
    /// number of bytes received.
    fn receive_packet(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// Peripheral bridged over TCP (serial-to-network adapters, remote rigs).
impl HardwareLink for TcpStream {
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        self.write_all(packet)?;
        self.flush()
    }

    /// Fills all of `buf`, across as many reads as the segments need.
    fn receive_packet(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;
        while filled < buf.len() {
            let left = deadline.saturating_duration_since(Instant::now());
            // A zero timeout means "block forever" to the socket
            self.set_read_timeout(Some(left.max(Duration::from_millis(1))))?;
            match self.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("link closed after {filled} of {} bytes", buf.len()),
                    ));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("got {filled} of {} bytes before timeout", buf.len()),
                    ));
                }
                Err(e) => return Err(e),
            }
            if filled < buf.len() && Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("got {filled} of {} bytes before timeout", buf.len()),
                ));
            }
        }
        Ok(filled)
    }
}

/// In-process stand-in for the peripheral. It scans continuously and
/// acknowledges once per frame period, taking the period from the rate
/// code of the last completed frame.
#[derive(Debug)]
pub struct SimulatedPeripheral {
    period: Duration,
    last_ack: Option<Instant>,
    pub packets: u64,
    pub samples: u64,
    pub frames: u64,
}

impl SimulatedPeripheral {
    pub fn new(frame_duration: Duration) -> Self {
        Self {
            period: frame_duration,
            last_ack: None,
            packets: 0,
            samples: 0,
            frames: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl HardwareLink for SimulatedPeripheral {
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        if packet.len() < FT_MIN_PACKET_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "runt packet"));
        }
        let header: FTHeader = bytemuck::pod_read_unaligned(&packet[..FT_MIN_PACKET_SIZE]);
        if header.size as usize != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("header says {} bytes, got {}", header.size, packet.len()),
            ));
        }
        self.packets += 1;
        if header.kind != FT_P_TYPE_FRAME || packet.len() < FT_FRAME_HEADER_SIZE {
            return Ok(());
        }
        let frame: FTFrameHeader =
            bytemuck::pod_read_unaligned(&packet[FT_MIN_PACKET_SIZE..FT_FRAME_HEADER_SIZE]);
        self.samples += frame.count as u64;
        if frame.eof() {
            self.frames += 1;
            self.period = Duration::from_millis(frame.fps() as u64 * 5);
        }
        Ok(())
    }

    fn receive_packet(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let now = Instant::now();
        let due = self.last_ack.map_or(now, |t| t + self.period);
        if due > now {
            if due - now > timeout {
                spin_sleep::sleep(timeout);
                return Err(io::Error::new(io::ErrorKind::TimedOut, "frame still scanning"));
            }
            spin_sleep::sleep(due - now);
        }
        self.last_ack = Some(due.max(now));

        let ack = FTHeader {
            kind: FT_P_TYPE_SYNC,
            size: FT_MIN_PACKET_SIZE as u16,
        };
        let bytes = bytemuck::bytes_of(&ack);
        let n = buf.len().min(bytes.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}
