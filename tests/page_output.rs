use escpx::{
    pack_pixels, packed_len, Config, Encoder, Job, ModelFlags, PageDriver, PageGeometry,
    PageHeader, WeaveStats,
};

/// One graphics command read back from the print stream.
#[derive(Debug)]
struct Pass {
    y: usize,
    x: usize,
    color: u8,
    rows: usize,
    data: Vec<u8>,
}

fn unpack(stream: &[u8], want: usize) -> (Vec<u8>, usize) {
    let mut data = Vec::with_capacity(want);
    let mut i = 0;

    while data.len() < want {
        let n = stream[i] as usize;
        i += 1;
        if n < 128 {
            data.extend_from_slice(&stream[i..i + n + 1]);
            i += n + 1;
        } else {
            assert_ne!(n, 128, "packbits no-op in print data");
            data.extend(std::iter::repeat(stream[i]).take(257 - n));
            i += 1;
        }
    }

    assert_eq!(data.len(), want, "packbits run crosses the end of the band");
    (data, i)
}

/// Walk the page data and collect every graphics pass with its head position.
fn decode(out: &[u8], first_color: u8) -> Vec<Pass> {
    let mut passes = Vec::new();
    let (mut y, mut x, mut color) = (0, 0, first_color);
    let mut i = 0;

    while i < out.len() {
        let (data, used) = match out[i..] {
            [0x1B, b'(', b'v', 2, 0, lo, hi, ..] => {
                y += u16::from_le_bytes([lo, hi]) as usize;
                (None, 7)
            }
            [0x0D, ..] => {
                x = 0;
                (None, 1)
            }
            [0x1B, b'(', b'\\', 4, 0, 0xA0, 0x05, lo, hi, ..] => {
                x = u16::from_le_bytes([lo, hi]) as usize;
                (None, 9)
            }
            [0x1B, b'\\', lo, hi, ..] => {
                x = u16::from_le_bytes([lo, hi]) as usize;
                (None, 4)
            }
            [0x1B, b'(', b'r', 2, 0, 1, c, ..] => {
                color = c | 0x10;
                (None, 7)
            }
            [0x1B, b'r', c, ..] => {
                color = c;
                (None, 3)
            }
            [0x1B, b'.', compression, _, _, rows, lo, hi, ..] => {
                let bytes = u16::from_le_bytes([lo, hi]) as usize / 8;
                (Some((compression, rows as usize, bytes)), 8)
            }
            [0x1B, b'i', c, compression, _, blo, bhi, rlo, rhi, ..] => {
                color = c;
                let bytes = u16::from_le_bytes([blo, bhi]) as usize;
                let rows = u16::from_le_bytes([rlo, rhi]) as usize;
                (Some((compression, rows, bytes)), 9)
            }
            [0x0C] => break,
            _ => panic!("unexpected byte {:#04x} at offset {}", out[i], i),
        };
        i += used;

        if let Some((compression, rows, bytes)) = data {
            let want = rows * bytes;
            let data = if compression == 0 {
                i += want;
                out[i - want..i].to_vec()
            } else {
                let (data, consumed) = unpack(&out[i..], want);
                i += consumed;
                data
            };
            passes.push(Pass {
                y,
                x,
                color,
                rows,
                data,
            });
        }
    }

    assert_eq!(out.last(), Some(&0x0C), "page must end with a form feed");
    passes
}

fn pixel(data: &[u8], bits: u8, index: usize) -> u8 {
    let per_byte = 8 / bits as usize;
    let shift = 8 - bits as usize * (index % per_byte + 1);
    (data[index / per_byte] >> shift) & ((1 << bits) - 1)
}

/// Dithered test image, one value per pixel, `[plane][row][column]`.
fn image(planes: usize, width: usize, height: usize, bits: u8) -> Vec<Vec<Vec<u8>>> {
    let mut state: u32 = 0x1234_5678;
    let mask = (1u8 << bits) - 1;

    (0..planes)
        .map(|plane| {
            (0..height)
                .map(|y| {
                    (0..width)
                        .map(|_| {
                            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                            let value = (state >> 16) as u8 & mask;
                            if y % 7 == 3 || (y + plane) % 5 == 0 || (state >> 24) & 3 != 0 {
                                0
                            } else {
                                value
                            }
                        })
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Print `image` on a fresh encoder and rebuild the dots from the stream.
fn print_and_rebuild(
    header: PageHeader,
    config: &Config,
    image: &[Vec<Vec<u8>>],
) -> (Vec<Vec<Vec<u8>>>, Vec<Pass>, WeaveStats) {
    let geometry = PageGeometry::new(&header, config).unwrap();
    let planes = geometry.planes();
    let bits = geometry.bit_planes;
    let width = header.width as usize;
    let height = header.height as usize;
    let (row_step, col_step) = (geometry.row_step, geometry.col_step);
    let codes: Vec<u8> = (0..planes).map(|p| geometry.layout.color_code(p)).collect();

    let mut encoder = Encoder::new(Vec::new());
    let stats = {
        let mut page = PageDriver::new(&mut encoder, geometry);
        for y in 0..height {
            let lines: Vec<Vec<u8>> = image
                .iter()
                .map(|plane| {
                    let mut line = vec![0u8; packed_len(width, bits)];
                    pack_pixels(&plane[y], bits, 0, 1, width, &mut line);
                    line
                })
                .collect();
            page.process_line(y, &lines[..]).unwrap();
        }
        page.finish().unwrap()
    };

    let out = encoder.into_inner();
    let passes = decode(&out, codes[0]);
    let mut canvas = vec![vec![vec![0u8; width]; height]; planes];

    for pass in &passes {
        let plane = codes.iter().position(|&c| c == pass.color).unwrap();
        let bytes = pass.data.len() / pass.rows;

        for r in 0..pass.rows {
            let row = &pass.data[r * bytes..(r + 1) * bytes];
            for k in 0..bytes * 8 / bits as usize {
                let value = pixel(row, bits, k);
                if value == 0 {
                    continue;
                }
                let y = pass.y + r * row_step;
                let x = pass.x + k * col_step;
                assert!(y < height && x < width, "dot outside the page at {},{}", x, y);
                assert_eq!(canvas[plane][y][x], 0, "dot printed twice at {},{}", x, y);
                canvas[plane][y][x] = value;
            }
        }
    }

    (canvas, passes, stats)
}

fn assert_ordered(passes: &[Pass]) {
    for pair in passes.windows(2) {
        assert!(
            (pair[0].y, pair[0].x) <= (pair[1].y, pair[1].x),
            "{:?} printed before {:?}",
            (pair[0].y, pair[0].x),
            (pair[1].y, pair[1].x)
        );
    }
}

#[test]
fn test_direct_page_reproduces_image() {
    let header = PageHeader::new([360, 360], 100, 30);
    let config = Config::new(ModelFlags::empty(), 1);
    let image = image(1, 100, 30, 1);

    let (canvas, passes, stats) = print_and_rebuild(header, &config, &image);

    assert_eq!(canvas, image);
    assert_eq!(stats, WeaveStats::default());
    // one graphics command per non-blank line, blank lines only feed
    let printed = image[0].iter().filter(|row| row.iter().any(|&v| v != 0)).count();
    assert_eq!(passes.len(), printed);
    assert!(passes.iter().all(|pass| pass.rows == 1));
    assert_ordered(&passes);
}

#[test]
fn test_direct_color_page_reproduces_image() {
    let header = PageHeader::new([720, 720], 48, 20);
    let config = Config::new(ModelFlags::empty(), 4);
    let image = image(4, 48, 20, 1);

    let (canvas, passes, _) = print_and_rebuild(header, &config, &image);

    assert_eq!(canvas, image);
    assert_ordered(&passes);
}

#[test]
fn test_softweave_page_reproduces_image() {
    let header = PageHeader::new([720, 720], 64, 40)
        .weave(4, 0, 2)
        .compression(1);
    let config = Config::new(ModelFlags::empty(), 1);
    let image = image(1, 64, 40, 1);

    let (canvas, passes, stats) = print_and_rebuild(header, &config, &image);

    assert_eq!(canvas, image);
    assert_eq!(stats.rows_placed[0], 40);
    assert_eq!(stats.rows_placed, stats.rows_retired);
    assert!(passes.iter().all(|pass| pass.rows >= 1 && pass.rows <= 4));
    assert_ordered(&passes);
}

#[test]
fn test_softweave_column_passes_reproduce_image() {
    let header = PageHeader::new([720, 720], 64, 50).weave(8, 0, 202);
    let config = Config::new(ModelFlags::empty(), 4);
    let image = image(4, 64, 50, 1);

    let (canvas, passes, stats) = print_and_rebuild(header, &config, &image);

    assert_eq!(canvas, image);
    for plane in 0..4 {
        // every line lands in both column passes
        assert_eq!(stats.rows_placed[plane], 100);
    }
    assert_eq!(stats.rows_placed, stats.rows_retired);
    assert!(passes.iter().any(|pass| pass.x == 1));
    assert_ordered(&passes);
}

#[test]
fn test_softweave_esc_i_two_bit_reproduces_image() {
    let header = PageHeader::new([720, 720], 40, 45)
        .weave(6, 0, 103)
        .compression(1);
    let config = Config::new(ModelFlags::RASTER_ESCI, 6).bit_planes(2);
    let image = image(6, 40, 45, 2);

    let (canvas, passes, stats) = print_and_rebuild(header, &config, &image);

    assert_eq!(canvas, image);
    assert_eq!(stats.rows_placed, stats.rows_retired);
    assert_ordered(&passes);
}

#[test]
fn test_blank_page_prints_nothing_but_a_form_feed() {
    let header = PageHeader::new([360, 360], 80, 25);
    let config = Config::new(ModelFlags::empty(), 1);
    let image = vec![vec![vec![0u8; 80]; 25]];

    let (_, passes, _) = print_and_rebuild(header, &config, &image);

    assert!(passes.is_empty());
}

#[test]
fn test_job_stream_layout() {
    let header = PageHeader::new([720, 720], 64, 16)
        .page_size(612, 792)
        .weave(4, 0, 2);
    let config = Config::new(ModelFlags::ESCK, 1);
    let line = vec![vec![0xA5u8; 8]];

    let mut job = Job::new(Vec::new(), config).unwrap();
    let first = job
        .print_page(&header, std::iter::repeat(line.clone()).take(16))
        .unwrap();
    let second = job
        .print_page(&header, std::iter::repeat(line).take(16))
        .unwrap();
    assert_eq!(job.pages(), 2);
    let out = job.finish().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.rows_placed[0], 16);
    assert!(out.starts_with(&[0x1B, b'@', 0x1B, b'(', b'G', 1, 0, 1]));
    assert!(out.ends_with(&[0x0C, 0x1B, b'@']));
}
