use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use crate::clipboard::*;
use crate::codec::{self, row_bytes, BitmapHeader, ClipboardData, MetafilePict};
use crate::dib::DibHeader;
use crate::format::Format;
use crate::remote::RemoteStore;
use crate::render::MM_ISOTROPIC;
use crate::store::StoreError;
use crate::tests::graphics::{Object, TestGraphics};
use crate::tests::state::*;
use crate::tests::windows::{RecordingWindows, ThreadWindows};
use crate::tests::TestServer;
use crate::window::{Message, WindowId};

type TestClipboard = Clipboard<RemoteStore, RecordingWindows, TestGraphics>;

fn window(raw: u32) -> WindowId {
    WindowId::new(raw).unwrap()
}

fn client(server: &TestServer) -> TestClipboard {
    Clipboard::new(server.connect(), RecordingWindows::new(), TestGraphics::new())
}

fn bytes(data: &[u8]) -> ClipboardData {
    ClipboardData::Bytes(data.to_vec())
}

fn state_with(entries: &[(Format, &[u8])], owner: Option<WindowId>) -> State {
    let entries: BTreeMap<_, _> = entries
        .iter()
        .map(|&(format, data)| (format, data.to_vec()))
        .collect();
    State::with_contents(Contents { entries }, owner)
}

#[test]
fn open_twice() {
    let server = TestServer::new();
    let mut first = client(&server);
    let mut second = client(&server);
    server.run(State::default());

    first.open(None).unwrap();
    assert!(matches!(first.open(None), Err(Error::AlreadyOpen)));
    assert!(first.is_open());
    assert!(matches!(second.open(None), Err(Error::AlreadyOpen)));
    assert!(!second.is_open());

    first.close().unwrap();
    second.open(None).unwrap();
}

#[test]
fn close_without_open() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    assert!(matches!(clipboard.close(), Err(Error::NotOpen)));
}

#[test]
fn session_closes_on_drop() {
    let server = TestServer::new();
    let mut first = client(&server);
    let mut second = client(&server);
    server.run(State::default());

    {
        let session = first.session(Some(window(1))).unwrap();
        assert!(session.is_open());
    }
    assert!(!first.is_open());

    let mut session = second.session(None).unwrap();
    assert_eq!(session.open_window().unwrap(), None);
    session.close().unwrap();
}

#[test]
fn claim_empties_the_clipboard() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(state_with(
        &[(Format::RIFF, b"riff"), (Format(0xc000), b"custom")],
        None,
    ));

    let mut session = clipboard.session(Some(window(1))).unwrap();
    assert_eq!(session.count().unwrap(), 2);
    session.claim_ownership(Some(window(1))).unwrap();
    assert_eq!(session.count().unwrap(), 0);
    assert_eq!(session.owner().unwrap(), Some(window(1)));
    session.close().unwrap();

    let state = state.lock().unwrap();
    assert!(state.entries.is_empty());
    assert_eq!(state.owner, Some(window(1)));
}

#[test]
fn claim_notifies_previous_owner_and_viewer() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let mut state = state_with(&[(Format::RIFF, b"riff")], Some(window(7)));
    state.viewer = Some(window(5));
    server.run(state);

    clipboard.open(Some(window(1))).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();

    let windows = clipboard.windows();
    assert_eq!(windows.sent, [(window(7), Message::DestroyClipboard)]);
    assert_eq!(
        windows.posted,
        [(
            window(5),
            Message::DrawClipboard {
                owner: Some(window(1))
            }
        )]
    );
}

#[test]
fn put_requires_session() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    assert!(matches!(
        clipboard.put(Format::RIFF, &bytes(b"riff")),
        Err(Error::Store(StoreError::AccessDenied))
    ));
}

#[test]
fn put_refuses_bad_data() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();

    assert!(matches!(
        clipboard.put(Format::TEXT, &bytes(b"")),
        Err(Error::Codec(Format::TEXT, codec::Error::Empty))
    ));
    assert!(matches!(
        clipboard.put(Format::BITMAP, &bytes(b"pixels")),
        Err(Error::Codec(Format::BITMAP, codec::Error::Mismatch(..)))
    ));
}

#[test]
fn get_from_empty_clipboard() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    let mut session = clipboard.session(None).unwrap();
    let err = session.get(Format::TEXT).unwrap_err();
    assert!(matches!(err, Error::NoData(Format::TEXT)));
    assert!(err.is_no_data());
    drop(session);

    assert!(clipboard.windows().sent.is_empty());
}

#[test]
fn get_large_payload() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let payload = vec![0x5a; 2000];
    let state = server.run(state_with(&[(Format::RIFF, &payload)], None));

    clipboard.open(None).unwrap();
    let data = clipboard.get(Format::RIFF).unwrap();
    assert_eq!(data.as_bytes(), Some(&payload[..]));

    assert_eq!(
        state.lock().unwrap().gets,
        [(Format::RIFF, 1024), (Format::RIFF, 2000)]
    );
}

#[test]
fn get_gives_up_on_growing_payload() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let mut state = state_with(&[(Format::RIFF, &[1; 2000])], None);
    state.growth.insert(Format::RIFF, 100);
    let state = server.run(state);

    clipboard.open(None).unwrap();
    let err = clipboard.get(Format::RIFF).unwrap_err();
    assert!(matches!(err, Error::Unavailable(Format::RIFF)));
    assert!(err.is_no_data());

    assert_eq!(
        state.lock().unwrap().gets,
        [
            (Format::RIFF, 1024),
            (Format::RIFF, 2000),
            (Format::RIFF, 2100)
        ]
    );
}

#[test]
fn text_synthesis() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(State::default());

    clipboard.open(Some(window(1))).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard
        .put(Format::UNICODETEXT, &ClipboardData::unicode_text("Hello"))
        .unwrap();
    clipboard.close().unwrap();

    {
        let state = state.lock().unwrap();
        assert!(state.entries[&Format::TEXT].is_empty());
        assert!(state.entries[&Format::OEMTEXT].is_empty());
        assert_eq!(state.entries[&Format::LOCALE], 0x0409u32.to_le_bytes());
    }
    assert_eq!(clipboard.synthesized().len(), 2);
    assert_eq!(
        clipboard.synthesized().source(Format::TEXT),
        Some(Format::UNICODETEXT)
    );

    clipboard.open(None).unwrap();
    let text = clipboard.get(Format::TEXT).unwrap();
    assert_eq!(text.as_bytes(), Some(&b"Hello\0"[..]));
    assert_eq!(clipboard.synthesized().source(Format::TEXT), None);

    // The rendered text is now a plain entry.
    let again = clipboard.get(Format::TEXT).unwrap();
    assert_eq!(again, text);
    clipboard.close().unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.entries[&Format::TEXT], b"Hello\0");
    assert_eq!(
        state
            .gets
            .iter()
            .filter(|(format, _)| *format == Format::UNICODETEXT)
            .count(),
        1
    );
}

#[test]
fn narrow_text_to_wide() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard.put(Format::TEXT, &bytes(b"caf\xe9\0")).unwrap();
    clipboard.close().unwrap();

    clipboard.open(None).unwrap();
    let wide = clipboard.get(Format::UNICODETEXT).unwrap();
    assert_eq!(wide, ClipboardData::unicode_text("café"));

    let oem = clipboard.get(Format::OEMTEXT).unwrap();
    assert_eq!(oem.as_bytes(), Some(&b"caf\x82\0"[..]));
}

#[test]
fn direct_put_wins_over_synthesis() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard
        .put(Format::UNICODETEXT, &ClipboardData::unicode_text("wide"))
        .unwrap();
    clipboard.put(Format::TEXT, &bytes(b"narrow\0")).unwrap();
    clipboard.close().unwrap();

    assert_eq!(clipboard.synthesized().source(Format::TEXT), None);
    assert_eq!(
        clipboard.synthesized().source(Format::OEMTEXT),
        Some(Format::UNICODETEXT)
    );

    clipboard.open(None).unwrap();
    let text = clipboard.get(Format::TEXT).unwrap();
    assert_eq!(text.as_bytes(), Some(&b"narrow\0"[..]));
}

#[test]
fn existing_locale_is_kept() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(State::default());

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard
        .put(Format::LOCALE, &bytes(&0x0411u32.to_le_bytes()))
        .unwrap();
    clipboard.put(Format::TEXT, &bytes(b"x\0")).unwrap();
    clipboard.close().unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.entries[&Format::LOCALE], 0x0411u32.to_le_bytes());
}

#[test]
fn unchanged_session_does_not_synthesize_or_notify() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let mut state = state_with(&[(Format::UNICODETEXT, &[b'a', 0, 0, 0])], None);
    state.viewer = Some(window(5));
    state.listeners.insert(window(6));
    let state = server.run(state);

    clipboard.open(None).unwrap();
    assert_eq!(clipboard.close().unwrap().viewer, None);

    assert!(clipboard.synthesized().is_empty());
    assert!(clipboard.windows().posted.is_empty());
    assert_eq!(state.lock().unwrap().entries.len(), 1);
}

#[test]
fn viewer_and_listeners_are_notified() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    assert_eq!(clipboard.set_viewer(Some(window(5))).unwrap(), None);
    clipboard.add_listener(window(6)).unwrap();
    assert_eq!(clipboard.viewer().unwrap(), Some(window(5)));

    clipboard.open(Some(window(1))).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard.put(Format::RIFF, &bytes(b"riff")).unwrap();
    clipboard.close().unwrap();

    let draw = Message::DrawClipboard {
        owner: Some(window(1)),
    };
    assert_eq!(
        clipboard.windows().posted,
        [
            (window(5), Message::DrawClipboard { owner: None }),
            (window(5), draw),
            (window(5), draw),
            (window(6), Message::ClipboardUpdate),
        ]
    );

    clipboard.remove_listener(window(6)).unwrap();
    assert!(matches!(
        clipboard.remove_listener(window(6)),
        Err(Error::Store(StoreError::NotFound))
    ));
}

#[test]
fn viewer_chain_changes() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    assert_eq!(clipboard.set_viewer(Some(window(1))).unwrap(), None);
    assert_eq!(
        clipboard.set_viewer(Some(window(2))).unwrap(),
        Some(window(1))
    );

    // Window 1 is not the head, so the head passes the removal down the chain.
    assert!(clipboard.change_chain(window(1), None).unwrap());
    assert_eq!(
        clipboard.windows().sent,
        [(
            window(2),
            Message::ChangeChain {
                removed: window(1),
                next: None
            }
        )]
    );
    assert_eq!(clipboard.viewer().unwrap(), Some(window(2)));

    assert!(clipboard.change_chain(window(2), Some(window(3))).unwrap());
    assert_eq!(clipboard.viewer().unwrap(), Some(window(3)));
}

#[test]
fn viewer_chain_change_without_head() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    assert!(matches!(
        clipboard.change_chain(window(1), None),
        Err(Error::Store(StoreError::InvalidParameter))
    ));
}

#[test]
fn priority_format() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(State::default());

    assert_eq!(
        clipboard.priority_format(&[Format::TEXT]).unwrap(),
        PriorityFormat::Empty
    );

    state
        .lock()
        .unwrap()
        .entries
        .insert(Format::RIFF, b"riff".to_vec());

    assert_eq!(
        clipboard
            .priority_format(&[Format::TEXT, Format::RIFF, Format::HDROP])
            .unwrap(),
        PriorityFormat::Found(Format::RIFF)
    );
    assert_eq!(
        clipboard.priority_format(&[Format::TEXT]).unwrap(),
        PriorityFormat::NoneAvailable
    );
    assert!(!clipboard.contains(Format::NONE).unwrap());
    assert_eq!(clipboard.updated_formats().unwrap(), [Format::RIFF]);
    assert!(clipboard.windows().updates > 0);
}

#[test]
fn enumerate_formats() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(state_with(
        &[(Format::TEXT, b"a\0"), (Format::RIFF, b"riff")],
        None,
    ));

    clipboard.open(None).unwrap();
    let mut formats = Vec::new();
    let mut previous = Format::NONE;
    while let Some(format) = clipboard.enumerate(previous).unwrap() {
        formats.push(format);
        previous = format;
    }
    assert_eq!(formats, [Format::TEXT, Format::RIFF]);
}

#[test]
fn register_format() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    let html = clipboard.register_format("HTML Format").unwrap();
    assert_eq!(html, Format(0xc000));
    assert_eq!(clipboard.register_format("html format").unwrap(), html);
    assert_eq!(clipboard.register_format("Rich Text").unwrap(), Format(0xc001));

    assert_eq!(
        clipboard.format_name(html).unwrap().as_deref(),
        Some("HTML Format")
    );
    assert_eq!(clipboard.format_name(Format(0xc002)).unwrap(), None);
    assert_eq!(clipboard.format_name(Format::TEXT).unwrap(), None);

    assert!(matches!(
        clipboard.register_format(""),
        Err(Error::Store(StoreError::InvalidParameter))
    ));
}

#[test]
fn release_owner() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(State::default());

    clipboard.open(Some(window(1))).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard.put_delayed(Format::RIFF).unwrap();
    clipboard.close().unwrap();

    assert!(matches!(
        clipboard.release_owner(window(2)),
        Err(Error::Store(StoreError::NotOwner))
    ));

    clipboard.release_owner(window(1)).unwrap();
    assert_eq!(
        clipboard.windows().sent.last(),
        Some(&(window(1), Message::RenderAllFormats))
    );
    assert_eq!(state.lock().unwrap().owner, None);
}

#[test]
fn missing_owner_window() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(state_with(&[(Format::RIFF, b"")], Some(window(7))));

    clipboard.windows().invalid.insert(window(7));
    clipboard.open(None).unwrap();
    assert!(matches!(
        clipboard.get(Format::RIFF),
        Err(Error::NoData(Format::RIFF))
    ));
}

#[test]
fn owner_renders_delayed_format() {
    let server = TestServer::new();
    let mut owner = client(&server);
    let reader = server.connect();
    server.run(State::default());

    owner.open(Some(window(1))).unwrap();
    owner.claim_ownership(Some(window(1))).unwrap();
    owner.put_delayed(Format::RIFF).unwrap();
    owner.close().unwrap();

    let mut windows = ThreadWindows::new();
    windows.spawn(window(1), move |message| match message {
        Message::RenderFormat(Format::RIFF) => {
            owner.put(Format::RIFF, &bytes(b"rendered")).is_ok()
        }
        _ => false,
    });

    let mut reader = Clipboard::new(reader, windows, TestGraphics::new());
    reader.open(None).unwrap();
    let data = reader.get(Format::RIFF).unwrap();
    assert_eq!(data.as_bytes(), Some(&b"rendered"[..]));

    // Not found at all, and the owner doesn't render it.
    assert!(matches!(
        reader.get(Format::HDROP),
        Err(Error::NoData(Format::HDROP))
    ));
}

#[test]
fn owner_render_timeout() {
    let server = TestServer::new();
    let reader = server.connect();
    server.run(state_with(&[(Format::RIFF, b"")], Some(window(1))));

    let mut windows = ThreadWindows::new();
    windows.spawn(window(1), |_| {
        thread::sleep(Duration::from_millis(500));
        true
    });

    let mut options = Options::new();
    options.render_timeout(Duration::from_millis(50));
    let mut reader = Clipboard::with_options(reader, windows, TestGraphics::new(), options);

    reader.open(None).unwrap();
    let err = reader.get(Format::RIFF).unwrap_err();
    assert!(matches!(
        err,
        Error::RenderTimeout {
            format: Format::RIFF,
            owner
        } if owner == window(1)
    ));
    assert!(err.is_no_data());
}

#[test]
fn bitmap_synthesis() {
    let server = TestServer::new();
    let mut writer = client(&server);
    let mut reader = client(&server);
    server.run(State::default());

    let stride = row_bytes(2, 24);
    let pixels: Vec<u8> = (0..stride as u8 * 2).collect();
    let bitmap = writer.graphics().bitmap(2, 2, 24, pixels.clone());

    writer.open(None).unwrap();
    writer.claim_ownership(Some(window(1))).unwrap();
    writer.put(Format::BITMAP, &ClipboardData::Bitmap(bitmap)).unwrap();
    writer.close().unwrap();
    assert_eq!(writer.synthesized().source(Format::DIB), Some(Format::BITMAP));
    assert_eq!(writer.synthesized().source(Format::DIBV5), Some(Format::BITMAP));

    writer.open(None).unwrap();
    let dib = writer.get(Format::DIB).unwrap();
    let dib = dib.as_bytes().unwrap();
    let header = DibHeader::parse(dib).unwrap();
    assert_eq!((header.width, header.height, header.bit_count), (2, -2, 24));
    assert_eq!(dib.len(), header.info_size() + header.bits_size());
    assert_eq!(&dib[header.info_size()..][..stride], &pixels[..stride]);

    let v5 = writer.get(Format::DIBV5).unwrap();
    let v5 = DibHeader::parse(v5.as_bytes().unwrap()).unwrap();
    assert_eq!(v5.size as usize, crate::dib::V5_HEADER_SIZE);
    writer.close().unwrap();

    reader.open(None).unwrap();
    let ClipboardData::Bitmap(handle) = reader.get(Format::BITMAP).unwrap() else {
        panic!("expected a bitmap");
    };
    assert_eq!(
        reader.graphics().object(handle),
        Some(&Object::Bitmap {
            header: BitmapHeader::new(2, 2, 24),
            bits: pixels,
        })
    );
}

#[test]
fn bitmap_from_dib() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    let mut packed = Vec::new();
    DibHeader::new(2, 2, 32).write(false, &mut packed);
    let bottom: Vec<u8> = (1..=8).collect();
    let top: Vec<u8> = (9..=16).collect();
    packed.extend_from_slice(&bottom);
    packed.extend_from_slice(&top);

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard.put(Format::DIB, &bytes(&packed)).unwrap();
    clipboard.close().unwrap();

    clipboard.open(None).unwrap();
    let ClipboardData::Bitmap(handle) = clipboard.get(Format::BITMAP).unwrap() else {
        panic!("expected a bitmap");
    };
    assert_eq!(
        clipboard.graphics().object(handle),
        Some(&Object::Bitmap {
            header: BitmapHeader::new(2, 2, 32),
            bits: [top, bottom].concat(),
        })
    );

    let v5 = clipboard.get(Format::DIBV5).unwrap();
    let v5 = v5.as_bytes().unwrap();
    assert_eq!(v5.len(), crate::dib::V5_HEADER_SIZE + 16);
    assert_eq!(&v5[crate::dib::V5_HEADER_SIZE..], &packed[40..]);
}

#[test]
fn rendering_twice_gives_the_same_data() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(State::default());

    clipboard.open(Some(window(1))).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard
        .put(Format::UNICODETEXT, &ClipboardData::unicode_text("Grüße"))
        .unwrap();
    clipboard.close().unwrap();

    clipboard.open(None).unwrap();
    let first = clipboard
        .render_synthesized(Format::TEXT, Format::UNICODETEXT)
        .unwrap();
    let second = clipboard
        .render_synthesized(Format::TEXT, Format::UNICODETEXT)
        .unwrap();
    assert_eq!(first.as_bytes(), Some(&b"Gr\xfc\xdfe\0"[..]));
    assert_eq!(second, first);
    clipboard.close().unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.entries[&Format::TEXT], b"Gr\xfc\xdfe\0");
}

#[test]
fn failed_conversion_puts_nothing() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    let state = server.run(State::default());

    // A header without any pixels.
    let mut packed = Vec::new();
    DibHeader::new(2, 2, 32).write(false, &mut packed);

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard.put(Format::DIB, &bytes(&packed)).unwrap();
    clipboard.close().unwrap();
    assert_eq!(
        clipboard.synthesized().source(Format::DIBV5),
        Some(Format::DIB)
    );

    let sequence = state.lock().unwrap().sequence;
    clipboard.open(None).unwrap();
    assert!(matches!(
        clipboard.get(Format::DIBV5),
        Err(Error::Render {
            target: Format::DIBV5,
            from: Format::DIB,
            ..
        })
    ));
    assert_eq!(
        clipboard.synthesized().source(Format::DIBV5),
        Some(Format::DIB)
    );
    clipboard.close().unwrap();

    let state = state.lock().unwrap();
    assert!(state.entries[&Format::DIBV5].is_empty());
    assert_eq!(state.entries[&Format::DIB], packed);
    assert_eq!(state.sequence, sequence);
}

#[test]
fn open_without_owner_forgets_synthesized_formats() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(None).unwrap();
    clipboard.put(Format::TEXT, &bytes(b"Hi\0")).unwrap();
    clipboard.close().unwrap();
    assert_eq!(
        clipboard.synthesized().source(Format::UNICODETEXT),
        Some(Format::TEXT)
    );

    clipboard.open(None).unwrap();
    assert!(clipboard.synthesized().is_empty());

    // The placeholder stays on the clipboard, but nothing renders it any more.
    let err = clipboard.get(Format::UNICODETEXT).unwrap_err();
    assert!(matches!(err, Error::NoData(Format::UNICODETEXT)));
    clipboard.close().unwrap();
}

#[test]
fn metafile_synthesis() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    let emf = clipboard
        .graphics()
        .enh_metafile([10, 20, 110, 220], b"records");

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard
        .put(Format::ENHMETAFILE, &ClipboardData::EnhMetafile(emf))
        .unwrap();
    clipboard.close().unwrap();

    clipboard.open(None).unwrap();
    let ClipboardData::MetafilePict(pict) = clipboard.get(Format::METAFILEPICT).unwrap() else {
        panic!("expected a metafile picture");
    };
    assert_eq!((pict.mm, pict.x_ext, pict.y_ext), (MM_ISOTROPIC, 100, 200));
    assert_eq!(
        clipboard.graphics().object(pict.hmf.unwrap()),
        Some(&Object::Metafile(b"WMFrecords".to_vec()))
    );
}

#[test]
fn enh_metafile_from_picture() {
    let server = TestServer::new();
    let mut clipboard = client(&server);
    server.run(State::default());

    let hmf = clipboard.graphics().metafile(b"WMFdraw".to_vec());
    let pict = MetafilePict {
        mm: 8,
        x_ext: 300,
        y_ext: 400,
        hmf: Some(hmf),
    };

    clipboard.open(None).unwrap();
    clipboard.claim_ownership(Some(window(1))).unwrap();
    clipboard
        .put(Format::METAFILEPICT, &ClipboardData::MetafilePict(pict))
        .unwrap();
    clipboard.close().unwrap();

    clipboard.open(None).unwrap();
    let ClipboardData::EnhMetafile(handle) = clipboard.get(Format::ENHMETAFILE).unwrap() else {
        panic!("expected an enhanced metafile");
    };

    let mut expected: Vec<u8> = [0i32, 0, 300, 400]
        .iter()
        .flat_map(|x| x.to_le_bytes())
        .collect();
    expected.extend_from_slice(b"draw");
    assert_eq!(
        clipboard.graphics().object(handle),
        Some(&Object::EnhMetafile(expected))
    );
}

#[test]
fn palette_between_processes() {
    let server = TestServer::new();
    let mut writer = client(&server);
    let mut reader = client(&server);
    server.run(State::default());

    let entries = vec![255, 0, 0, 0, 0, 255, 0, 0];
    let palette = writer.graphics().palette(entries.clone());

    writer.open(None).unwrap();
    writer.claim_ownership(Some(window(1))).unwrap();
    writer.put(Format::PALETTE, &ClipboardData::Palette(palette)).unwrap();
    writer.close().unwrap();

    reader.open(None).unwrap();
    let ClipboardData::Palette(handle) = reader.get(Format::PALETTE).unwrap() else {
        panic!("expected a palette");
    };
    assert_eq!(
        reader.graphics().object(handle),
        Some(&Object::Palette(entries))
    );
}

#[test]
fn display_bitmap_stays_in_process() {
    let server = TestServer::new();
    let mut writer = client(&server);
    let mut reader = client(&server);
    server.run(State::default());

    let bitmap = writer.graphics().bitmap(1, 1, 32, vec![1, 2, 3, 4]);

    writer.open(None).unwrap();
    writer.claim_ownership(Some(window(1))).unwrap();
    writer
        .put(Format::DSPBITMAP, &ClipboardData::Bitmap(bitmap))
        .unwrap();
    writer.close().unwrap();

    reader.open(None).unwrap();
    let err = reader.get(Format::DSPBITMAP).unwrap_err();
    assert!(matches!(
        err,
        Error::Codec(
            Format::DSPBITMAP,
            codec::Error::UnsupportedCrossProcess(Format::DSPBITMAP)
        )
    ));
    assert!(!err.is_no_data());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn put_then_get(contents: Contents) {
        let server = TestServer::new();
        let mut writer = client(&server);
        let mut reader = client(&server);
        server.run(State::default());

        writer.open(Some(window(1))).unwrap();
        writer.claim_ownership(Some(window(1))).unwrap();
        for (&format, data) in &contents.entries {
            writer.put(format, &bytes(data)).unwrap();
        }
        writer.close().unwrap();

        reader.open(None).unwrap();
        for (&format, data) in &contents.entries {
            let got = reader.get(format).unwrap();
            prop_assert_eq!(got.as_bytes(), Some(&data[..]));
        }
        reader.close().unwrap();
    }

    #[test]
    fn stored_contents_are_listed(contents: Contents) {
        let server = TestServer::new();
        let mut clipboard = client(&server);
        server.run(State::with_contents(contents.clone(), None));

        let formats = clipboard.updated_formats().unwrap();
        let expected: Vec<Format> = contents.entries.keys().copied().collect();
        prop_assert_eq!(formats, expected);
        prop_assert_eq!(clipboard.count().unwrap() as usize, contents.entries.len());
    }
}
