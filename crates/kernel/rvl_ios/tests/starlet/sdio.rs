use std::{cell::RefCell, rc::Rc};

use rvl_ios::{
    Command, IosErrorKind, WireMessage,
    sdio::{DataTransfer, SLOT0, SdCommand, Sdio, SdioError, SdioStatus},
};

use rvl_rtos::sim::SimPort;

use crate::support::{Bench, Event, FakeStarlet, buffer, path, vectors, word};

type Slot = Sdio<'static, SimPort, FakeStarlet>;

const FD: i32 = 5;

/// What the host controller saw, one entry per request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Open(String),
    Close(i32),
    Ioctl { id: usize, input: Vec<u8>, output_len: usize },
    Ioctlv { id: usize, inputs: Vec<Vec<u8>>, outputs: Vec<usize> },
}

/// Answers SDIO requests with fixed words and fills data buffers with
/// `0x5d`.
fn controller(seen: Rc<RefCell<Vec<Seen>>>) -> impl FnMut(&mut WireMessage) -> i32 + 'static {
    move |msg| {
        let (entry, ret) = match msg.command() {
            Some(Command::Open) => (Seen::Open(unsafe { path(msg) }), FD),
            Some(Command::Close) => (Seen::Close(msg.fd), 0),
            Some(Command::Ioctl) => {
                let input = unsafe { buffer(msg.args[1], msg.args[2]) }.to_vec();
                let output = unsafe { buffer(msg.args[3], msg.args[4]) };
                let reply = match msg.args[0] {
                    0x02 => 0x1234_u32,
                    0x04 => 0xb0b0_0000,
                    0x0b => 0x1_0001,
                    0x0c => 0x80ff_8000,
                    _ => 0,
                };
                if output.len() == 4 {
                    output.copy_from_slice(&reply.to_ne_bytes());
                } else if output.len() == 16 {
                    for (i, chunk) in output.chunks_exact_mut(4).enumerate() {
                        chunk.copy_from_slice(&(0x100_u32 + u32::try_from(i).unwrap()).to_ne_bytes());
                    }
                }
                let output_len = output.len();
                (
                    Seen::Ioctl {
                        id: msg.args[0],
                        input,
                        output_len,
                    },
                    0,
                )
            }
            Some(Command::Ioctlv) => {
                let vecs = unsafe { vectors(msg) };
                let (ins, outs) = vecs.split_at(msg.args[1]);
                let inputs = ins
                    .iter()
                    .map(|v| unsafe { buffer(v.data, v.len) }.to_vec())
                    .collect();
                // the data buffer is both sent and filled by the card
                if let Some(data) = ins.get(1) {
                    unsafe { buffer(data.data, data.len) }.fill(0x5d);
                }
                for out in outs {
                    unsafe { buffer(out.data, out.len) }.fill(0xcc);
                }
                (
                    Seen::Ioctlv {
                        id: msg.args[0],
                        inputs,
                        outputs: outs.iter().map(|v| v.len).collect(),
                    },
                    0,
                )
            }
            _ => return -4,
        };
        seen.borrow_mut().push(entry);
        ret
    }
}

fn open_slot(bench: &Bench) -> (Slot, Rc<RefCell<Vec<Seen>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    bench.serve(controller(Rc::clone(&seen)));
    let sdio = Sdio::new(bench.ios());
    sdio.open(SLOT0).unwrap();
    (sdio, seen)
}

#[test]
fn operations_need_an_open_slot() {
    let bench = Bench::new();
    let sdio = Sdio::new(bench.ios());
    assert!(!sdio.is_open());
    assert_eq!(sdio.status(), Err(SdioError::NotOpen));
    assert_eq!(sdio.set_clock(1), Err(SdioError::NotOpen));
    assert_eq!(bench.starlet().posted(), 0);
}

#[test]
fn open_is_done_once() {
    let bench = Bench::new();
    let (sdio, seen) = open_slot(&bench);
    sdio.open(SLOT0).unwrap();
    assert!(sdio.is_open());
    assert_eq!(*seen.borrow(), [Seen::Open(SLOT0.to_owned())]);

    sdio.close().unwrap();
    assert!(!sdio.is_open());
    sdio.close().unwrap();
    assert_eq!(seen.borrow().last(), Some(&Seen::Close(FD)));
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn failed_open_leaves_the_slot_closed() {
    let bench = Bench::new();
    bench.serve(|_| -6);
    let sdio = Sdio::new(bench.ios());
    let err = sdio.open(SLOT0).unwrap_err();
    let SdioError::Ios(ios) = err else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(ios.kind(), IosErrorKind::NotFound);
    assert!(!sdio.is_open());
}

#[test]
fn status_and_card_words() {
    let bench = Bench::new();
    let (sdio, seen) = open_slot(&bench);

    let status = sdio.status().unwrap();
    assert_eq!(status, SdioStatus::INSERTED | SdioStatus::INITIALIZED);
    assert!(!status.contains(SdioStatus::SDHC));
    assert_eq!(sdio.reset_card(), Ok(0xb0b0_0000));
    assert_eq!(sdio.read_ocr(), Ok(0x80ff_8000));

    let ids = seen
        .borrow()
        .iter()
        .filter_map(|s| match s {
            Seen::Ioctl { id, input, output_len } => {
                assert!(input.is_empty());
                assert_eq!(*output_len, 4);
                Some(*id)
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(ids, [0x0b, 0x04, 0x0c]);
}

#[test]
fn register_access_layout() {
    let bench = Bench::new();
    let (sdio, seen) = open_slot(&bench);

    assert_eq!(sdio.read_hc_register(0x28, 1), Ok(0x1234));
    sdio.write_hc_register(0x2c, 2, 0x0107).unwrap();
    sdio.set_clock(1).unwrap();

    let seen = seen.borrow();
    let Seen::Ioctl { id, input, output_len } = &seen[1] else {
        panic!("unexpected {:?}", seen[1]);
    };
    assert_eq!((*id, *output_len), (0x02, 4));
    let words = (0..6).map(|i| word(input, i)).collect::<Vec<_>>();
    assert_eq!(words, [0x28, 0, 0, 1, 0, 0]);

    let Seen::Ioctl { id, input, output_len } = &seen[2] else {
        panic!("unexpected {:?}", seen[2]);
    };
    assert_eq!((*id, *output_len), (0x01, 0));
    let words = (0..6).map(|i| word(input, i)).collect::<Vec<_>>();
    assert_eq!(words, [0x2c, 0, 0, 2, 0x0107, 0]);

    assert_eq!(
        seen[3],
        Seen::Ioctl {
            id: 0x06,
            input: 1_u32.to_ne_bytes().to_vec(),
            output_len: 0,
        }
    );
}

#[test]
fn command_without_data_is_a_plain_ioctl() {
    let bench = Bench::new();
    let (sdio, seen) = open_slot(&bench);
    let cmd = SdCommand {
        index: 9,
        command_type: 3,
        response_type: 2,
        argument: 0xb0b0_0000,
    };

    assert_eq!(sdio.send_command(cmd, None), Ok([0x100, 0x101, 0x102, 0x103]));

    let seen = seen.borrow();
    let Seen::Ioctl { id, input, output_len } = &seen[1] else {
        panic!("unexpected {:?}", seen[1]);
    };
    assert_eq!((*id, *output_len), (0x07, 16));
    let words = (0..9).map(|i| word(input, i)).collect::<Vec<_>>();
    assert_eq!(words, [9, 3, 2, 0xb0b0_0000, 0, 0, 0, 0, 0]);
}

#[test]
fn command_with_data_goes_vectored() {
    let bench = Bench::new();
    let (sdio, seen) = open_slot(&bench);
    let mut block = [0_u8; 512];
    let block_addr = block.as_ptr().addr();
    bench.starlet().clear_events();

    let cmd = SdCommand {
        index: 17,
        command_type: 1,
        response_type: 1,
        argument: 0x800,
    };
    let transfer = DataTransfer {
        buf: &mut block,
        block_count: 1,
        block_size: 512,
    };
    assert_eq!(sdio.send_command(cmd, Some(transfer)), Ok([0xcccc_cccc; 4]));
    assert_eq!(block, [0x5d; 512]);

    let seen = seen.borrow();
    let Seen::Ioctlv { id, inputs, outputs } = &seen[1] else {
        panic!("unexpected {:?}", seen[1]);
    };
    assert_eq!(*id, 0x07);
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[1], [0; 512]);
    assert_eq!(*outputs, [16]);
    let record = (0..9).map(|i| word(&inputs[0], i)).collect::<Vec<_>>();
    let dma = u32::try_from(block_addr & 0xffff_ffff).unwrap();
    assert_eq!(record, [17, 1, 1, 0x800, 1, 512, dma, 1, 0]);

    let events = bench.starlet().events();
    let flush = events.iter().position(|e| *e == Event::Flush(block_addr, 512)).unwrap();
    let invalidate = events
        .iter()
        .rposition(|e| *e == Event::Invalidate(block_addr, 512))
        .unwrap();
    assert!(flush < invalidate);
}

#[test]
fn device_errors_surface_as_ios_errors() {
    let bench = Bench::new();
    let (sdio, _) = open_slot(&bench);
    bench.serve(|_| -1);
    assert!(matches!(
        sdio.reset_card(),
        Err(SdioError::Ios(e)) if e.kind() == IosErrorKind::AccessDenied
    ));
    // still open; the failure was the card's
    assert!(sdio.is_open());
}
