use std::{cell::RefCell, rc::Rc};

use rvl_ios::{
    Command, IosErrorKind, WireMessage,
    settings::{SETTINGS_LEN, SETTINGS_PATH, SYSCONF_LEN, SYSCONF_PATH, scramble},
};

use crate::support::{Bench, buffer, path};

fn setting_txt(text: &str) -> Vec<u8> {
    let mut data = vec![0; SETTINGS_LEN];
    data[..text.len()].copy_from_slice(text.as_bytes());
    scramble(&mut data);
    data
}

/// `SYSCONF` with two boolean entries and a small array.
fn sysconf() -> Vec<u8> {
    let mut data = b"SCv0".to_vec();
    let entries: [(&str, u8, &[u8]); 3] = [
        ("IPL.PGS", 7, &[1]),
        ("IPL.E60", 7, &[0]),
        ("IPL.NIK", 2, &[4, b'w', b'i', b'i', b'!', 0]),
    ];
    let table = 6 + entries.len() * 2;
    data.extend(u16::try_from(entries.len()).unwrap().to_be_bytes());
    data.resize(table, 0);
    for (i, (name, ty, value)) in entries.into_iter().enumerate() {
        let offset = u16::try_from(data.len()).unwrap().to_be_bytes();
        data[6 + i * 2..8 + i * 2].copy_from_slice(&offset);
        data.push((ty << 5) | u8::try_from(name.len() - 1).unwrap());
        data.extend(name.as_bytes());
        data.extend(value);
    }
    data
}

type Reads = Rc<RefCell<Vec<usize>>>;

/// Serves `files` by path. Descriptors are indices plus 10.
fn file_server(files: Vec<(&'static str, Vec<u8>)>) -> (impl FnMut(&mut WireMessage) -> i32, Reads) {
    let reads = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&reads);
    let server = move |msg: &mut WireMessage| {
        let Ok(index) = usize::try_from(msg.fd - 10) else {
            return match msg.command() {
                Some(Command::Open) => {
                    let wanted = unsafe { path(msg) };
                    files
                        .iter()
                        .position(|(p, _)| *p == wanted)
                        .map_or(-106, |i| i32::try_from(i).unwrap() + 10)
                }
                _ => -4,
            };
        };
        match msg.command() {
            Some(Command::Read) => {
                let contents = &files[index].1;
                let dst = unsafe { buffer(msg.args[0], msg.args[1]) };
                let n = dst.len().min(contents.len());
                dst[..n].copy_from_slice(&contents[..n]);
                seen.borrow_mut().push(dst.len());
                i32::try_from(n).unwrap()
            }
            Some(Command::Close) => 0,
            _ => -4,
        }
    };
    (server, reads)
}

#[test]
fn settings_load_through_ios() {
    let bench = Bench::new();
    let (server, reads) = file_server(vec![
        (SETTINGS_PATH, setting_txt("AREA=EUR\r\nMODEL=RVL-001(EUR)\r\nVIDEO=PAL\r\nGAME=EU\r\n")),
        (SYSCONF_PATH, sysconf()),
    ]);
    bench.serve(server);

    let settings = bench.ios().initialize_with_settings().unwrap();
    assert_eq!(settings.text.get("AREA"), Some("EUR"));
    assert_eq!(settings.text.get("VIDEO"), Some("PAL"));
    assert_eq!(settings.text.get("MODEL"), Some("RVL-001(EUR)"));
    assert_eq!(settings.text.get("DVD"), None);

    assert!(settings.sysconf.progressive_scan());
    assert!(!settings.sysconf.eurgb60());
    let mut nick = [0; 3];
    assert_eq!(settings.sysconf.get("IPL.NIK", &mut nick), 5);
    assert_eq!(&nick, b"wii");

    assert_eq!(*reads.borrow(), [SETTINGS_LEN, SYSCONF_LEN]);
    assert_eq!(bench.starlet().irq_enables(), 1);
    assert_eq!(bench.ipc.in_flight(), 0);
}

#[test]
fn missing_settings_file_is_reported() {
    let bench = Bench::new();
    let (server, reads) = file_server(vec![(SYSCONF_PATH, sysconf())]);
    bench.serve(server);

    let Err(err) = bench.ios().initialize_with_settings() else {
        panic!("loaded settings without setting.txt");
    };
    assert_eq!(err.code(), -106);
    assert_eq!(err.kind(), IosErrorKind::Unknown);
    assert!(reads.borrow().is_empty());
}

#[test]
fn failed_read_still_closes_the_file() {
    let bench = Bench::new();
    let closed = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&closed);
    bench.serve(move |msg| match msg.command() {
        Some(Command::Open) => 10,
        Some(Command::Read) => -1,
        Some(Command::Close) => {
            *counter.borrow_mut() += 1;
            0
        }
        _ => -4,
    });

    let err = rvl_ios::settings::SettingsText::load(&bench.ios()).err().unwrap();
    assert_eq!(err.kind(), IosErrorKind::AccessDenied);
    assert_eq!(*closed.borrow(), 1);
}
