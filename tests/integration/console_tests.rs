//! Console commands driven through a connected client, end to end through
//! the controller.

use std::cell::RefCell;
use std::rc::Rc;

use trex::app::events::{MaintEvent, RebootReason};
use trex::app::ports::ConsoleSession;
use trex::config::MaintConfig;

use crate::mocks::{Harness, SessionState, Shared, sta_config};

const ASSET: &[u8] = &[0xAA; 10];

fn connected(config: MaintConfig) -> (Harness, Shared<SessionState>) {
    let mut h = Harness::new(config);
    h.enter();
    let session = h.connect_client(0);
    (h, session)
}

fn connected_with_fs() -> (Harness, Shared<SessionState>) {
    let config = MaintConfig {
        enable_upload: true,
        ..sta_config()
    };
    let mut h = Harness::with_upload(config, &[("/asset.bin", ASSET)]);
    h.enter();
    let session = h.connect_client(0);
    (h, session)
}

#[test]
fn greeting_lists_base_commands() {
    let (_h, session) = connected(sta_config());
    assert_eq!(
        session.borrow().output,
        "\r\n[TREX] telnet ready. cmds: help, ip, rssi, free, whoami, reboot\r\n"
    );
}

#[test]
fn greeting_lists_fs_commands_when_upload_live() {
    let (_h, session) = connected_with_fs();
    assert_eq!(
        session.borrow().output,
        "\r\n[TREX] telnet ready. cmds: help, ip, rssi, free, whoami, reboot, df, ls, stat, rm, format\r\n"
    );
}

#[test]
fn status_commands() {
    let (mut h, s) = connected(sta_config());
    assert_eq!(h.run_line(&s, "ip"), "IP: 10.0.0.7\r\n");
    assert_eq!(h.run_line(&s, "rssi"), "RSSI: -55 dBm\r\n");
    assert_eq!(h.run_line(&s, "free"), "Heap: 123456\r\n");
    assert_eq!(h.run_line(&s, "whoami"), "trex id=1 type=loot\r\n");
    assert_eq!(h.run_line(&s, "help"), "help, ip, rssi, free, whoami, reboot\r\n");
}

#[test]
fn ip_reports_access_point_address_after_fallback() {
    let mut h = Harness::with_net(sta_config(), |n| n.sta_fails = true);
    h.enter();
    let s = h.connect_client(0);
    assert_eq!(h.run_line(&s, "ip"), "IP: 192.168.4.1\r\n");
}

#[test]
fn command_word_is_case_insensitive() {
    let (mut h, s) = connected(sta_config());
    assert_eq!(h.run_line(&s, "WHOAMI"), "trex id=1 type=loot\r\n");
    assert_eq!(h.run_line(&s, "  Ip \r"), "IP: 10.0.0.7\r\n");
}

#[test]
fn commands_are_reported_trimmed() {
    let (mut h, s) = connected(sta_config());
    h.run_line(&s, "   free   ");
    assert!(h.sink.events.contains(&MaintEvent::ConsoleCommand {
        line: "free".into()
    }));
}

#[test]
fn blank_line_answers_question_mark() {
    let (mut h, s) = connected(sta_config());
    assert_eq!(h.run_line(&s, "   "), "?\r\n");
    assert_eq!(h.run_line(&s, ""), "?\r\n");
    assert_eq!(
        h.sink.count(|e| matches!(e, MaintEvent::ConsoleCommand { .. })),
        2
    );
}

#[test]
fn unknown_command_answers_question_mark() {
    let (mut h, s) = connected(sta_config());
    assert_eq!(h.run_line(&s, "dance"), "?\r\n");
}

#[test]
fn one_line_per_poll() {
    let (mut h, s) = connected(sta_config());
    s.borrow_mut().output.clear();
    s.borrow_mut().type_line("ip");
    s.borrow_mut().type_line("free");

    h.poll(1);
    assert_eq!(s.borrow().output, "IP: 10.0.0.7\r\n");
    h.poll(2);
    assert_eq!(s.borrow().output, "IP: 10.0.0.7\r\nHeap: 123456\r\n");
}

#[test]
fn reboot_replies_then_restarts() {
    let (mut h, s) = connected(sta_config());
    assert_eq!(h.run_line(&s, "reboot"), "Rebooting...\r\n");
    assert!(
        h.sink
            .events
            .contains(&MaintEvent::Rebooting(RebootReason::ConsoleCommand))
    );
    assert_eq!(h.system.borrow().delays, vec![200]);
    assert_eq!(h.system.borrow().restarts, 1);
}

// ── Filesystem ────────────────────────────────────────────────

#[test]
fn fs_commands_hidden_without_upload() {
    let (mut h, s) = connected(sta_config());
    assert_eq!(h.run_line(&s, "ls"), "?\r\n");
    assert_eq!(h.run_line(&s, "format"), "?\r\n");
    assert_eq!(h.sink.count(|e| *e == MaintEvent::FilesystemFormatted), 0);
}

#[test]
fn fs_inspection() {
    let (mut h, s) = connected_with_fs();
    assert_eq!(h.run_line(&s, "df"), "FS: 10/4096 bytes\r\n");
    assert_eq!(h.run_line(&s, "ls"), "/asset.bin 10\r\n");
    assert_eq!(h.run_line(&s, "stat"), "/asset.bin 10 bytes\r\n");
    assert_eq!(h.run_line(&s, "stat /asset.bin"), "/asset.bin 10 bytes\r\n");
    assert_eq!(h.run_line(&s, "stat /missing"), "ERR not found\r\n");
}

#[test]
fn rm_needs_a_path() {
    let (mut h, s) = connected_with_fs();
    assert_eq!(h.run_line(&s, "rm"), "usage: rm <path>\r\n");
    assert_eq!(h.run_line(&s, "rm /asset.bin"), "removed /asset.bin\r\n");
    assert_eq!(h.run_line(&s, "rm /asset.bin"), "ERR not found\r\n");
    assert_eq!(h.run_line(&s, "ls"), "(empty)\r\n");
}

#[test]
fn format_wipes_and_reports() {
    let (mut h, s) = connected_with_fs();
    assert_eq!(h.run_line(&s, "format"), "format ok\r\n");
    assert_eq!(h.sink.count(|e| *e == MaintEvent::FilesystemFormatted), 1);
    assert_eq!(h.run_line(&s, "df"), "FS: 0/4096 bytes\r\n");
}

// ── External handler ──────────────────────────────────────────

#[test]
fn external_handler_sees_only_unclaimed_lines() {
    let mut h = Harness::new(sta_config());
    let seen = Rc::new(RefCell::new(Vec::<String>::new()));
    let log = Rc::clone(&seen);
    h.ctl
        .set_command_handler(move |line: &str, out: &mut dyn ConsoleSession| {
            log.borrow_mut().push(line.to_string());
            if line == "score" {
                out.write_str("score 42\r\n");
                return true;
            }
            false
        });
    h.enter();
    let s = h.connect_client(0);

    assert_eq!(h.run_line(&s, "ip"), "IP: 10.0.0.7\r\n");
    assert_eq!(h.run_line(&s, "score"), "score 42\r\n");
    assert_eq!(h.run_line(&s, "Hello World"), "?\r\n");
    assert_eq!(*seen.borrow(), vec!["score".to_string(), "Hello World".to_string()]);
}
