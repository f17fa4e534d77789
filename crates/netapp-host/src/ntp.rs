//! SNTP client with daylight-saving rules.
//!
//! The clock keeps the offset between the NTP server and the host's system
//! clock, so reading the time never touches the network. Local time is
//! derived from UTC with the configured standard and daylight-saving rules.

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use netapp_core::{Month, NtpClock, NtpError, TimeRule, Week, Weekday};
use tracing::{debug, info, warn};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

const PACKET_LEN: usize = 48;

/// Client request: LI 0, version 3, mode 3.
const CLIENT_REQUEST: u8 = 0x1b;

/// Upper bound on one request. Resyncs run inside the application loop, so
/// an unreachable server may only stall it briefly.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(250);

pub struct SntpClock {
    server: String,
    request_timeout: Duration,
    dst: Option<TimeRule>,
    std: Option<TimeRule>,
    update_interval: Duration,
    started: bool,
    last_attempt: Option<Instant>,
    /// Server time minus system time.
    correction: TimeDelta,
}

impl SntpClock {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dst: None,
            std: None,
            update_interval: Duration::from_millis(netapp_core::time::DEFAULT_UPDATE_INTERVAL_MS),
            started: false,
            last_attempt: None,
            correction: TimeDelta::zero(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Current UTC time corrected by the last sync.
    pub fn now_utc(&self) -> DateTime<Utc> {
        Utc::now() + self.correction
    }

    /// Format `utc` as local time under the configured rules.
    pub fn format_local(&self, utc: DateTime<Utc>, format: &str) -> String {
        let offset = local_offset_minutes(utc, self.dst.as_ref(), self.std.as_ref());
        (utc.naive_utc() + TimeDelta::minutes(i64::from(offset)))
            .format(format)
            .to_string()
    }

    fn sync(&mut self) -> Result<(), NtpError> {
        self.last_attempt = Some(Instant::now());
        let server_time = query(&self.server, self.request_timeout)?;
        self.correction = server_time - Utc::now();
        debug!(
            server = %self.server,
            correction_ms = self.correction.num_milliseconds(),
            "NTP sync complete"
        );
        Ok(())
    }
}

impl NtpClock for SntpClock {
    fn set_dst_rule(&mut self, rule: TimeRule) {
        self.dst = Some(rule);
    }

    fn set_std_rule(&mut self, rule: TimeRule) {
        self.std = Some(rule);
    }

    fn set_update_interval(&mut self, interval_ms: u64) {
        self.update_interval = Duration::from_millis(interval_ms);
    }

    fn begin(&mut self) -> Result<(), NtpError> {
        self.sync()?;
        self.started = true;
        info!(server = %self.server, "NTP client started");
        Ok(())
    }

    fn update(&mut self) -> Result<bool, NtpError> {
        if !self.started {
            return Ok(false);
        }
        let due = self
            .last_attempt
            .map_or(true, |at| at.elapsed() >= self.update_interval);
        if !due {
            return Ok(false);
        }
        match self.sync() {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(server = %self.server, error = %e, "NTP resync failed");
                Err(e)
            }
        }
    }

    fn formatted_time(&self, format: &str) -> String {
        self.format_local(self.now_utc(), format)
    }
}

fn query(server: &str, timeout: Duration) -> Result<DateTime<Utc>, NtpError> {
    let unreachable = |e: std::io::Error| NtpError::Unreachable(format!("{}: {}", server, e));

    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(unreachable)?;
    socket.set_read_timeout(Some(timeout)).map_err(unreachable)?;
    socket.connect(server).map_err(unreachable)?;

    let mut request = [0u8; PACKET_LEN];
    request[0] = CLIENT_REQUEST;
    socket.send(&request).map_err(unreachable)?;

    let mut response = [0u8; PACKET_LEN];
    let len = socket.recv(&mut response).map_err(unreachable)?;
    parse_transmit_timestamp(&response[..len])
}

/// Extract the server's transmit timestamp from an SNTP response.
pub fn parse_transmit_timestamp(packet: &[u8]) -> Result<DateTime<Utc>, NtpError> {
    if packet.len() < PACKET_LEN {
        return Err(NtpError::InvalidResponse(format!(
            "expected {} bytes, got {}",
            PACKET_LEN,
            packet.len()
        )));
    }
    let mode = packet[0] & 0x07;
    if mode != 4 && mode != 5 {
        return Err(NtpError::InvalidResponse(format!("unexpected mode {}", mode)));
    }

    let seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    let fraction = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]);
    if seconds == 0 {
        return Err(NtpError::InvalidResponse("empty transmit timestamp".to_string()));
    }

    let unix_seconds = i64::from(seconds) - NTP_UNIX_OFFSET;
    let nanos = ((u64::from(fraction) * 1_000_000_000) >> 32) as u32;
    DateTime::from_timestamp(unix_seconds, nanos)
        .ok_or_else(|| NtpError::InvalidResponse(format!("timestamp {} out of range", seconds)))
}

/// UTC offset in effect at `utc`.
///
/// With both rules set, daylight-saving time runs from the DST transition
/// (given in standard local time) to the standard transition (given in
/// daylight local time). Southern-hemisphere rules, where the DST period
/// wraps the new year, are handled too.
pub fn local_offset_minutes(
    utc: DateTime<Utc>,
    dst: Option<&TimeRule>,
    std: Option<&TimeRule>,
) -> i32 {
    let (dst, std) = match (dst, std) {
        (Some(dst), Some(std)) => (dst, std),
        (None, Some(rule)) | (Some(rule), None) => return rule.offset_minutes,
        (None, None) => return 0,
    };

    let now = utc.naive_utc();
    let year = utc.year();
    let (Some(summer), Some(winter)) = (
        transition_utc(dst, year, std.offset_minutes),
        transition_utc(std, year, dst.offset_minutes),
    ) else {
        return std.offset_minutes;
    };

    let in_dst = if summer < winter {
        now >= summer && now < winter
    } else {
        now >= summer || now < winter
    };
    if in_dst {
        dst.offset_minutes
    } else {
        std.offset_minutes
    }
}

/// Moment a rule takes effect in `year`, as naive UTC.
fn transition_utc(rule: &TimeRule, year: i32, previous_offset_minutes: i32) -> Option<NaiveDateTime> {
    let local = rule_date(rule, year)?.and_hms_opt(u32::from(rule.hour), 0, 0)?;
    Some(local - TimeDelta::minutes(i64::from(previous_offset_minutes)))
}

fn rule_date(rule: &TimeRule, year: i32) -> Option<NaiveDate> {
    let month = month_number(rule.month);
    let weekday = chrono_weekday(rule.weekday);

    let nth = match rule.week {
        Week::First => 1,
        Week::Second => 2,
        Week::Third => 3,
        Week::Fourth => 4,
        Week::Last => {
            let next_month = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            }?;
            let mut day = next_month.pred_opt()?;
            while day.weekday() != weekday {
                day = day.pred_opt()?;
            }
            return Some(day);
        }
    };
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth)
}

fn month_number(month: Month) -> u32 {
    month as u32
}

fn chrono_weekday(day: Weekday) -> chrono::Weekday {
    match day {
        Weekday::Sun => chrono::Weekday::Sun,
        Weekday::Mon => chrono::Weekday::Mon,
        Weekday::Tue => chrono::Weekday::Tue,
        Weekday::Wed => chrono::Weekday::Wed,
        Weekday::Thu => chrono::Weekday::Thu,
        Weekday::Fri => chrono::Weekday::Fri,
        Weekday::Sat => chrono::Weekday::Sat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use netapp_core::time::{CENTRAL_EUROPEAN_SUMMER_TIME, CENTRAL_EUROPEAN_TIME, STATUS_TIME_FORMAT};
    use pretty_assertions::assert_eq;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn cet_offset(at: DateTime<Utc>) -> i32 {
        local_offset_minutes(at, Some(&CENTRAL_EUROPEAN_SUMMER_TIME), Some(&CENTRAL_EUROPEAN_TIME))
    }

    #[test]
    fn test_last_sunday_rule_dates() {
        assert_eq!(
            rule_date(&CENTRAL_EUROPEAN_SUMMER_TIME, 2024),
            NaiveDate::from_ymd_opt(2024, 3, 31)
        );
        assert_eq!(
            rule_date(&CENTRAL_EUROPEAN_TIME, 2024),
            NaiveDate::from_ymd_opt(2024, 10, 27)
        );
        assert_eq!(
            rule_date(&CENTRAL_EUROPEAN_SUMMER_TIME, 2025),
            NaiveDate::from_ymd_opt(2025, 3, 30)
        );
    }

    #[test]
    fn test_nth_weekday_rule_date() {
        // Second Sunday of March 2024 (US daylight-saving start).
        let rule = TimeRule {
            abbreviation: "EDT",
            week: Week::Second,
            weekday: Weekday::Sun,
            month: Month::Mar,
            hour: 2,
            offset_minutes: -240,
        };
        assert_eq!(rule_date(&rule, 2024), NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[test]
    fn test_central_european_offsets() {
        assert_eq!(cet_offset(utc(2024, 1, 15, 12, 0, 0)), 60);
        assert_eq!(cet_offset(utc(2024, 7, 1, 12, 0, 0)), 120);
        assert_eq!(cet_offset(utc(2024, 12, 31, 23, 0, 0)), 60);
    }

    #[test]
    fn test_transitions_happen_at_one_utc() {
        assert_eq!(cet_offset(utc(2024, 3, 31, 0, 59, 59)), 60);
        assert_eq!(cet_offset(utc(2024, 3, 31, 1, 0, 0)), 120);
        assert_eq!(cet_offset(utc(2024, 10, 27, 0, 59, 59)), 120);
        assert_eq!(cet_offset(utc(2024, 10, 27, 1, 0, 0)), 60);
    }

    #[test]
    fn test_single_rule_or_none() {
        let at = utc(2024, 7, 1, 12, 0, 0);
        assert_eq!(local_offset_minutes(at, None, Some(&CENTRAL_EUROPEAN_TIME)), 60);
        assert_eq!(local_offset_minutes(at, None, None), 0);
    }

    #[test]
    fn test_format_local_uses_status_format() {
        let mut clock = SntpClock::new("127.0.0.1:123");
        clock.set_dst_rule(CENTRAL_EUROPEAN_SUMMER_TIME);
        clock.set_std_rule(CENTRAL_EUROPEAN_TIME);

        assert_eq!(
            clock.format_local(utc(2024, 7, 1, 10, 30, 5), STATUS_TIME_FORMAT),
            "12:30:05 - 2024-07-01"
        );
        assert_eq!(
            clock.format_local(utc(2024, 1, 1, 10, 30, 5), STATUS_TIME_FORMAT),
            "11:30:05 - 2024-01-01"
        );
    }

    #[test]
    fn test_parse_transmit_timestamp() {
        let mut packet = [0u8; PACKET_LEN];
        packet[0] = 0x1c; // version 3, server mode
        // 2024-01-01T00:00:00Z
        let seconds = (1_704_067_200i64 + NTP_UNIX_OFFSET) as u32;
        packet[40..44].copy_from_slice(&seconds.to_be_bytes());
        packet[44..48].copy_from_slice(&(1u32 << 31).to_be_bytes());

        let parsed = parse_transmit_timestamp(&packet).unwrap();
        assert_eq!(parsed.timestamp(), 1_704_067_200);
        assert_eq!(parsed.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_rejects_short_or_client_packets() {
        assert!(matches!(
            parse_transmit_timestamp(&[0u8; 12]),
            Err(NtpError::InvalidResponse(_))
        ));

        let mut packet = [0u8; PACKET_LEN];
        packet[0] = CLIENT_REQUEST;
        assert!(matches!(
            parse_transmit_timestamp(&packet),
            Err(NtpError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_silent_server_fails_fast() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut clock = SntpClock::new(silent.local_addr().unwrap().to_string());

        let started = Instant::now();
        let result = clock.begin();

        assert!(matches!(result, Err(NtpError::Unreachable(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.update().unwrap(), false);
    }

    #[test]
    fn test_update_before_begin_does_nothing() {
        let mut clock = SntpClock::new("127.0.0.1:9");
        assert_eq!(clock.update().unwrap(), false);
    }

    #[test]
    fn test_local_server_round_trip() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let responder = std::thread::spawn(move || {
            let mut request = [0u8; PACKET_LEN];
            let (_, client) = server.recv_from(&mut request).unwrap();
            assert_eq!(request[0], CLIENT_REQUEST);

            let mut reply = [0u8; PACKET_LEN];
            reply[0] = 0x1c;
            let seconds = (Utc::now().timestamp() + 3600 + NTP_UNIX_OFFSET) as u32;
            reply[40..44].copy_from_slice(&seconds.to_be_bytes());
            server.send_to(&reply, client).unwrap();
        });

        let mut clock = SntpClock::new(addr.to_string());
        clock.begin().unwrap();
        responder.join().unwrap();

        let drift = (clock.now_utc() - Utc::now()).num_seconds();
        assert!((3598..=3601).contains(&drift), "drift {}", drift);
    }
}
