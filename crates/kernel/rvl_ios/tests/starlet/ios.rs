use std::{cell::RefCell, rc::Rc};

use proptest::prelude::*;
use rvl_hal::PhysAddr;
use rvl_ios::{Command, Completion, Fd, IosErrorKind, IosRequest, OpenMode, Whence};
use rvl_rtos::{Woken, sim};

use crate::support::{Bench, Event, MemFile, buffer, path, vectors, wire};

std::thread_local! {
    static COMPLETED: RefCell<Vec<(usize, i32)>> = const { RefCell::new(Vec::new()) };
}

fn record(result: i32, arg: usize, _woken: &mut Woken) {
    COMPLETED.with_borrow_mut(|c| c.push((arg, result)));
}

fn addr_of<T>(value: &T) -> usize {
    (&raw const *value).addr()
}

#[test]
fn open_blocks_until_starlet_replies() {
    let bench = Bench::new();
    let ios = bench.ios();
    ios.initialize().unwrap();
    bench.serve(|msg| {
        assert_eq!(msg.command(), Some(Command::Open));
        assert_eq!(unsafe { path(msg) }, "/dev/null");
        assert_eq!(msg.args[1], 1);
        3
    });

    let yields = sim::yield_count();
    assert_eq!(ios.open("/dev/null", OpenMode::READ), Ok(Fd::from_raw(3)));
    assert_eq!(sim::yield_count(), yields + 1);
    assert_eq!(bench.kernel.current_task(), Some(bench.app));
    assert_eq!(bench.ipc.in_flight(), 0);
}

#[test]
fn negative_results_pass_through_unchanged() {
    let bench = Bench::new();
    let ios = bench.ios();
    bench.serve(|_| -106);
    let err = ios.open("/shared2/missing", OpenMode::READ).unwrap_err();
    assert_eq!(err.code(), -106);
    assert_eq!(err.kind(), IosErrorKind::Unknown);

    bench.serve(|_| -6);
    let err = ios.close(Fd::from_raw(9)).unwrap_err();
    assert_eq!(err.kind(), IosErrorKind::NotFound);
}

#[test]
fn invalid_paths_never_reach_starlet() {
    let bench = Bench::new();
    let ios = bench.ios();
    let long = "/".repeat(rvl_params::IOS_MAX_PATH);
    for bad in ["", "/dev/\0sdio", long.as_str()] {
        let err = ios.open(bad, OpenMode::READ).unwrap_err();
        assert_eq!(err.code(), -4);
    }
    assert_eq!(bench.starlet().posted(), 0);
}

#[test]
fn blocking_calls_need_a_running_scheduler() {
    let kernel = sim::new_kernel();
    let ipc = Box::leak(Box::new(rvl_ios::Ipc::new(
        crate::support::FakeStarlet::default(),
    )));
    let ios = rvl_ios::Ios::new(kernel, ipc);
    let err = ios.open("/dev/null", OpenMode::READ).unwrap_err();
    assert_eq!(err.kind(), IosErrorKind::NotReady);
    assert_eq!(ipc.hardware().posted(), 0);
}

#[test]
fn initialization_is_idempotent() {
    let bench = Bench::new();
    let ios = bench.ios();
    ios.initialize().unwrap();
    let after_first = bench.starlet().events();
    ios.initialize().unwrap();
    assert_eq!(bench.starlet().events(), after_first);
    assert_eq!(bench.starlet().irq_enables(), 1);
}

#[test]
fn async_completions_follow_reply_order() {
    COMPLETED.take();
    let bench = Bench::new();
    let ios = bench.ios();
    let starlet = bench.starlet();
    let mut requests = [IosRequest::new(), IosRequest::new(), IosRequest::new()];
    let mut buffers = [[0_u8; 32]; 3];

    for (i, (req, buf)) in requests.iter_mut().zip(&mut buffers).enumerate() {
        unsafe {
            ios.read_async(Fd::from_raw(3), buf, req, Completion::callback(record, i))
                .unwrap();
        }
    }
    // one doorbell at a time: each acknowledge posts the next
    assert_eq!(starlet.posted(), 1);
    bench.interrupt();
    bench.interrupt();
    let addrs = std::iter::from_fn(|| starlet.next_request()).collect::<Vec<_>>();
    assert_eq!(addrs.len(), 3);

    for (i, result) in [(2, 30), (0, 10), (1, 20)] {
        let msg = unsafe { wire(addrs[i]) };
        unsafe { buffer(msg.args[0], msg.args[1]) }.fill(u8::try_from(result).unwrap());
        starlet.complete(addrs[i], result);
        bench.interrupt();
    }

    assert_eq!(COMPLETED.take(), [(2, 30), (0, 10), (1, 20)]);
    assert_eq!(buffers, [[10; 32], [20; 32], [30; 32]]);
    assert_eq!(bench.ipc.in_flight(), 0);
}

#[test]
fn duplicate_reply_is_dropped() {
    let bench = Bench::new();
    let ios = bench.ios();
    let (kernel, ipc, app) = (bench.kernel, bench.ipc, bench.app);
    sim::set_yield_hook(move || {
        sim::reschedule(kernel);
        let starlet = ipc.hardware();
        ipc.handle_interrupt(&mut Woken::new());
        let addr = starlet.next_request().unwrap();
        let msg = unsafe { wire(addr) };
        unsafe { buffer(msg.args[3], msg.args[4]) }.copy_from_slice(b"ok");
        starlet.complete(addr, 5);
        let mut woken = Woken::new();
        ipc.handle_interrupt(&mut woken);
        assert!(woken.is_set());

        // the same reply again while the caller's frame is still live
        let before = *unsafe { wire(addr) };
        starlet.raise_reply(addr);
        let mut woken = Woken::new();
        ipc.handle_interrupt(&mut woken);
        assert!(!woken.is_set());
        assert_eq!(*unsafe { wire(addr) }, before);
        assert_eq!(sim::reschedule(kernel), Some(app));
    });

    let mut out = [0; 2];
    assert_eq!(ios.ioctl(Fd::from_raw(3), 1, &[7], &mut out), Ok(5));
    assert_eq!(&out, b"ok");
}

#[test]
fn reused_storage_ignores_the_old_reply() {
    COMPLETED.take();
    let bench = Bench::new();
    let ios = bench.ios();
    let starlet = bench.starlet();
    let mut req = IosRequest::new();

    unsafe { ios.close_async(Fd::from_raw(1), &mut req, Completion::callback(record, 1)) }.unwrap();
    let first = starlet.next_request().unwrap();
    starlet.complete(first, 0);
    bench.interrupt();
    assert_eq!(COMPLETED.take(), [(1, 0)]);

    unsafe { ios.close_async(Fd::from_raw(2), &mut req, Completion::callback(record, 2)) }.unwrap();
    bench.interrupt();
    let second = starlet.next_request().unwrap();
    assert_eq!(second, first);

    // a late copy of the first reply finds a request Starlet has not answered
    starlet.raise_reply(first);
    bench.interrupt();
    assert!(COMPLETED.take().is_empty());
    assert_eq!(bench.ipc.in_flight(), 1);

    starlet.complete(second, -1);
    bench.interrupt();
    assert_eq!(COMPLETED.take(), [(2, -1)]);
}

proptest! {
    #[test]
    fn stale_replies_never_reach_callbacks(
        order in Just((0..4_usize).collect::<Vec<_>>()).prop_shuffle(),
        bogus in proptest::collection::vec(1_usize..0x80, 0..4),
    ) {
        COMPLETED.take();
        let bench = Bench::new();
        let ios = bench.ios();
        let starlet = bench.starlet();
        let mut requests = (0..4).map(|_| Box::new(IosRequest::new())).collect::<Vec<_>>();
        for (i, req) in requests.iter_mut().enumerate() {
            unsafe { ios.seek_async(Fd::from_raw(3), 0, Whence::Start, req, Completion::callback(record, i)) }
                .unwrap();
        }
        for _ in 0..3 {
            bench.interrupt();
        }
        let addrs = std::iter::from_fn(|| starlet.next_request()).collect::<Vec<_>>();
        prop_assert_eq!(addrs.len(), 4);

        let mut expected = Vec::new();
        for &i in &order {
            starlet.complete(addrs[i], i32::try_from(i).unwrap() * 100);
            bench.interrupt();
            expected.push((i, i32::try_from(i).unwrap() * 100));

            let before = *unsafe { wire(addrs[i]) };
            starlet.raise_reply(addrs[i]);
            prop_assert!(!bench.interrupt().is_set());
            prop_assert_eq!(*unsafe { wire(addrs[i]) }, before);
        }
        for page in &bogus {
            starlet.raise_reply(PhysAddr::new(page * 0x20));
            bench.interrupt();
        }
        prop_assert_eq!(COMPLETED.take(), expected);
        prop_assert_eq!(bench.ipc.in_flight(), 0);
    }

    #[test]
    fn written_bytes_read_back(data in proptest::collection::vec(any::<u8>(), 1..512)) {
        let bench = Bench::new();
        let ios = bench.ios();
        let file = Rc::new(RefCell::new(MemFile::default()));
        let device = Rc::clone(&file);
        bench.serve(move |msg| device.borrow_mut().handle(msg));

        let fd = ios.open("/tmp/round-trip", OpenMode::READ_WRITE).unwrap();
        prop_assert_eq!(ios.write(fd, &data), Ok(data.len()));
        prop_assert_eq!(ios.seek(fd, 0, Whence::Start), Ok(0));
        let mut back = vec![0; data.len()];
        prop_assert_eq!(ios.read(fd, &mut back), Ok(data.len()));
        prop_assert_eq!(ios.close(fd), Ok(()));
        prop_assert_eq!(back, data);
        prop_assert_eq!(&file.borrow().opened, &["/tmp/round-trip".to_owned()]);
    }
}

#[test]
fn write_flushes_before_the_doorbell() {
    let bench = Bench::new();
    let ios = bench.ios();
    bench.serve(|msg| i32::try_from(msg.args[1]).unwrap());
    let data = [0x5a_u8; 48];
    ios.write(Fd::from_raw(3), &data).unwrap();

    let events = bench.starlet().events();
    let flush = events
        .iter()
        .position(|e| *e == Event::Flush(addr_of(&data), 48))
        .unwrap();
    let post = events.iter().position(|e| matches!(e, Event::Post(_))).unwrap();
    assert!(flush < post);
}

#[test]
fn read_invalidates_before_the_doorbell() {
    let bench = Bench::new();
    let ios = bench.ios();
    bench.serve(|msg| {
        unsafe { buffer(msg.args[0], msg.args[1]) }.fill(1);
        i32::try_from(msg.args[1]).unwrap()
    });
    let mut data = [0_u8; 64];
    assert_eq!(ios.read(Fd::from_raw(3), &mut data), Ok(64));
    assert_eq!(data, [1; 64]);

    let events = bench.starlet().events();
    let invalidate = events
        .iter()
        .position(|e| *e == Event::Invalidate(addr_of(&data), 64))
        .unwrap();
    let post = events.iter().position(|e| matches!(e, Event::Post(_))).unwrap();
    assert!(invalidate < post);
}

#[test]
fn ioctl_invalidates_output_after_the_reply() {
    let bench = Bench::new();
    let ios = bench.ios();
    bench.serve(|msg| {
        assert_eq!(msg.command(), Some(Command::Ioctl));
        assert_eq!(msg.args[0], 0x42);
        let input = unsafe { buffer(msg.args[1], msg.args[2]) }.to_vec();
        unsafe { buffer(msg.args[3], msg.args[4]) }.copy_from_slice(&input);
        0
    });
    let input = [1_u8, 2, 3, 4];
    let mut output = [0_u8; 4];
    assert_eq!(ios.ioctl(Fd::from_raw(3), 0x42, &input, &mut output), Ok(0));
    assert_eq!(output, input);

    let events = bench.starlet().events();
    let find = |event: Event| events.iter().position(|e| *e == event).unwrap();
    let post = events.iter().position(|e| matches!(e, Event::Post(_))).unwrap();
    assert!(find(Event::Flush(addr_of(&input), 4)) < post);
    assert!(find(Event::Flush(addr_of(&output), 4)) < post);
    let last_invalidate = events
        .iter()
        .rposition(|e| *e == Event::Invalidate(addr_of(&output), 4))
        .unwrap();
    let reply_handled = events.iter().rposition(|e| *e == Event::Acknowledge).unwrap();
    assert!(last_invalidate > reply_handled);
}

#[test]
fn ioctlv_copies_the_vector_table() {
    let bench = Bench::new();
    let ios = bench.ios();
    let input = [1_u8, 2, 3, 4];
    let mut output = [0_u8; 4];
    let (input_addr, output_addr) = (addr_of(&input), addr_of(&output));
    let table = Rc::new(RefCell::new(0));
    let seen_table = Rc::clone(&table);
    bench.serve(move |msg| {
        assert_eq!(msg.command(), Some(Command::Ioctlv));
        assert_eq!((msg.args[0], msg.args[1], msg.args[2]), (7, 1, 1));
        *seen_table.borrow_mut() = msg.args[3];
        let vecs = unsafe { vectors(msg) };
        assert_eq!((vecs[0].data, vecs[0].len), (input_addr, 4));
        assert_eq!((vecs[1].data, vecs[1].len), (output_addr, 4));
        let src = unsafe { buffer(vecs[0].data, vecs[0].len) }.to_vec();
        let dst = unsafe { buffer(vecs[1].data, vecs[1].len) };
        for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
            *d = *s;
        }
        0
    });

    let inputs: [&[u8]; 1] = [&input];
    let mut outputs: [&mut [u8]; 1] = [&mut output];
    assert_eq!(ios.ioctlv(Fd::from_raw(3), 7, &inputs, &mut outputs), Ok(0));
    assert_eq!(inputs[0].as_ptr().addr(), input_addr);
    assert_eq!(outputs[0].as_ptr().addr(), output_addr);
    assert_eq!(input, [1, 2, 3, 4]);
    assert_eq!(output, [4, 3, 2, 1]);

    let table = *table.borrow();
    assert_ne!(table, addr_of(&inputs));
    let events = bench.starlet().events();
    let post = events.iter().position(|e| matches!(e, Event::Post(_))).unwrap();
    let table_flush = events
        .iter()
        .position(|e| matches!(e, Event::Flush(start, _) if *start == table))
        .unwrap();
    assert!(table_flush < post);
    assert!(events.contains(&Event::Invalidate(output_addr, 4)));
    assert!(!events.contains(&Event::Invalidate(input_addr, 4)));
}

#[test]
fn too_many_vectors_are_rejected() {
    let bench = Bench::new();
    let ios = bench.ios();
    let chunk = [0_u8; 1];
    let inputs = [&chunk[..]; rvl_params::IOCTLV_MAX_VECTORS + 1];
    let err = ios.ioctlv(Fd::from_raw(3), 1, &inputs, &mut []).unwrap_err();
    assert_eq!(err.kind(), IosErrorKind::InvalidArgument);
    assert_eq!(bench.starlet().posted(), 0);
}

#[test]
fn pending_request_completes_in_the_background() {
    let bench = Bench::new();
    let ios = bench.ios();
    let starlet = bench.starlet();

    let pending = ios
        .read_request(Fd::from_raw(3), vec![0_u8; 16].into_boxed_slice())
        .unwrap();
    assert!(!pending.is_complete());
    let addr = starlet.next_request().unwrap();
    let msg = unsafe { wire(addr) };
    unsafe { buffer(msg.args[0], msg.args[1]) }.fill(9);
    starlet.complete(addr, 16);
    bench.interrupt();

    assert!(pending.is_complete());
    let yields = sim::yield_count();
    let (result, buffers) = pending.wait();
    assert_eq!(result, Ok(16));
    assert_eq!(sim::yield_count(), yields);
    assert_eq!(*buffers[0], [9; 16]);
}

#[test]
fn dropping_a_pending_request_waits_for_the_reply() {
    let bench = Bench::new();
    let ios = bench.ios();
    bench.serve(|msg| {
        unsafe { buffer(msg.args[3], msg.args[4]) }.fill(0xee);
        0
    });
    let input = Box::<[u8]>::default();
    let output = vec![0_u8; 8].into_boxed_slice();
    let out_addr = output.as_ptr().addr();

    let yields = sim::yield_count();
    let pending = ios.ioctl_request(Fd::from_raw(3), 2, input, output).unwrap();
    drop(pending);
    assert_eq!(sim::yield_count(), yields + 1);
    assert_eq!(bench.ipc.in_flight(), 0);
    let events = bench.starlet().events();
    assert_eq!(events.last(), Some(&Event::Invalidate(out_addr, 8)));
}

#[test]
fn waiting_hands_the_ioctl_buffers_back_in_order() {
    let bench = Bench::new();
    let ios = bench.ios();
    bench.serve(|msg| {
        let input = unsafe { buffer(msg.args[1], msg.args[2]) }.to_vec();
        let output = unsafe { buffer(msg.args[3], msg.args[4]) };
        output.copy_from_slice(&input);
        output.reverse();
        1
    });

    let pending = ios
        .ioctl_request(Fd::from_raw(3), 7, Box::new([1, 2, 3]), Box::new([0; 3]))
        .unwrap();
    let (result, buffers) = pending.wait();
    assert_eq!(result, Ok(1));
    assert_eq!(*buffers[0], [1, 2, 3]);
    assert_eq!(*buffers[1], [3, 2, 1]);
}

#[test]
fn leaked_request_keeps_its_buffer_out_of_reach() {
    let bench = Bench::new();
    let ios = bench.ios();
    let starlet = bench.starlet();
    let mine = [1_u8; 16];

    let request = vec![0_u8; 16].into_boxed_slice();
    let request_addr = request.as_ptr().addr();
    std::mem::forget(ios.read_request(Fd::from_raw(3), request).unwrap());

    let addr = starlet.next_request().unwrap();
    let msg = unsafe { wire(addr) };
    let target = unsafe { buffer(msg.args[0], msg.args[1]) };
    assert_eq!(target.as_ptr().addr(), request_addr);
    target.fill(9);
    starlet.complete(addr, 16);
    bench.interrupt();

    // the reply landed in the leaked allocation only
    assert_eq!(bench.ipc.in_flight(), 0);
    assert_eq!(mine, [1; 16]);
}
