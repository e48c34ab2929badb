//! InfluxDB v2 sink: one line-protocol point per inference record.
//!
//! The write is a single short-lived HTTP POST over a plain TCP stream with
//! connect/read/write timeouts. No timestamp is attached to the line; the
//! store assigns one on arrival.

use crate::sink::{ResultSink, SinkError};
use crate::state::InferenceRecord;
use std::fmt;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const MEASUREMENT: &str = "air_quality";

pub struct InfluxSink {
    url: String,
    org: String,
    bucket: String,
    token: String,
    timeout: Duration,
}

impl InfluxSink {
    pub fn new(
        url: String,
        org: String,
        bucket: String,
        token: String,
        timeout: Duration,
    ) -> Self {
        Self {
            url,
            org,
            bucket,
            token,
            timeout,
        }
    }

    fn write_path(&self) -> String {
        format!(
            "/api/v2/write?org={}&bucket={}&precision=ns",
            self.org, self.bucket
        )
    }
}

impl fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxSink")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResultSink for InfluxSink {
    fn record(&self, record: &InferenceRecord) -> Result<(), SinkError> {
        let line = line_protocol(record);
        send_write(&self.url, &self.write_path(), &self.token, &line, self.timeout)
    }
}

/// Formats one record as a line-protocol point: raw sample, fused result
/// fields (`aq_level` and `is_anomaly` as integers), then all nine features.
pub fn line_protocol(record: &InferenceRecord) -> String {
    let mut line = format!(
        "{} temp={},hum={},mq={},aq_level={}i,confidence={},anomaly_score={},is_anomaly={}i",
        MEASUREMENT,
        record.sample.temp,
        record.sample.hum,
        record.sample.mq,
        record.result.level.as_i64(),
        record.result.confidence,
        record.result.anomaly_score,
        i64::from(record.result.is_anomaly),
    );
    for (name, value) in record.features.named() {
        line.push_str(&format!(",{name}={value}"));
    }
    line
}

struct ParsedUrl {
    host: String,
    port: u16,
}

fn parse_http_url(url: &str) -> Result<ParsedUrl, SinkError> {
    let trimmed = url
        .strip_prefix("http://")
        .ok_or_else(|| SinkError::Transport("only http:// supported".to_string()))?;

    let host_port = trimmed
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SinkError::Transport("missing host".to_string()))?;

    let mut host_parts = host_port.splitn(2, ':');
    let host = host_parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SinkError::Transport("missing host".to_string()))?;
    let port = match host_parts.next() {
        Some(port_str) if !port_str.is_empty() => port_str
            .parse::<u16>()
            .map_err(|_| SinkError::Transport("invalid port".to_string()))?,
        _ => 8086,
    };

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
    })
}

fn send_write(
    url: &str,
    path: &str,
    token: &str,
    body: &str,
    timeout: Duration,
) -> Result<(), SinkError> {
    let parsed = parse_http_url(url)?;
    let addr = (parsed.host.as_str(), parsed.port)
        .to_socket_addrs()
        .map_err(|err| SinkError::Transport(format!("dns error: {err}")))?
        .next()
        .ok_or_else(|| SinkError::Transport("no addresses resolved".to_string()))?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|err| SinkError::Transport(format!("connect error: {err}")))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| SinkError::Transport(err.to_string()))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|err| SinkError::Transport(err.to_string()))?;

    let request = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nAuthorization: Token {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        parsed.host,
        token,
        body.len(),
        body
    );

    stream
        .write_all(request.as_bytes())
        .map_err(|err| SinkError::Transport(format!("io error: {err}")))?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .map_err(|err| SinkError::Transport(format!("io error: {err}")))?;

    let status_line = response
        .lines()
        .next()
        .ok_or_else(|| SinkError::Transport("empty http response".to_string()))?;
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SinkError::Transport("missing status code".to_string()))?
        .parse::<u16>()
        .map_err(|_| SinkError::Transport("invalid status code".to_string()))?;

    if status_code >= 400 {
        return Err(SinkError::Rejected(status_code));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::state::{AqLevel, FusedResult, SensorSample};

    fn record() -> InferenceRecord {
        InferenceRecord {
            sample: SensorSample {
                temp: 25.0,
                hum: 60.0,
                mq: 200.0,
            },
            features: FeatureVector {
                gas_norm: 0.5,
                rolling_mean_10: 200.0,
                rolling_std_10: 0.0,
                gas_diff: 0.0,
                gas_diff_norm: 0.0,
                hum_adjusted_gas: 320.0,
                temp_hum: 1500.0,
                temp_gas: 5000.0,
                hum_gas: 12000.0,
            },
            result: FusedResult {
                label: "Moderate".to_string(),
                level: AqLevel::Moderate,
                confidence: 0.88,
                is_anomaly: true,
                anomaly_score: -0.123,
            },
        }
    }

    #[test]
    fn line_protocol_covers_sample_result_and_features() {
        let line = line_protocol(&record());

        assert_eq!(
            line,
            "air_quality temp=25,hum=60,mq=200,aq_level=1i,confidence=0.88,\
             anomaly_score=-0.123,is_anomaly=1i,gas_norm=0.5,rolling_mean_10=200,\
             rolling_std_10=0,gas_diff=0,gas_diff_norm=0,hum_adjusted_gas=320,\
             temp_hum=1500,temp_gas=5000,hum_gas=12000"
        );
    }

    #[test]
    fn line_protocol_has_no_timestamp_field() {
        let line = line_protocol(&record());

        // A trailing timestamp would be a space-separated third section.
        assert_eq!(line.split(' ').count(), 2);
    }

    #[test]
    fn parse_http_url_accepts_host_and_port() {
        let parsed = parse_http_url("http://localhost:8086").expect("parse url");

        assert_eq!(parsed.host, "localhost");
        assert_eq!(parsed.port, 8086);
    }

    #[test]
    fn parse_http_url_defaults_port() {
        let parsed = parse_http_url("http://influx.local").expect("parse url");

        assert_eq!(parsed.host, "influx.local");
        assert_eq!(parsed.port, 8086);
    }

    #[test]
    fn parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("https://influx.local").is_err());
        assert!(parse_http_url("influx.local").is_err());
    }

    #[test]
    fn write_path_carries_org_and_bucket() {
        let sink = InfluxSink::new(
            "http://localhost:8086".to_string(),
            "home".to_string(),
            "air_quality".to_string(),
            "secret".to_string(),
            Duration::from_secs(5),
        );

        assert_eq!(
            sink.write_path(),
            "/api/v2/write?org=home&bucket=air_quality&precision=ns"
        );
    }

    #[test]
    fn debug_output_omits_the_token() {
        let sink = InfluxSink::new(
            "http://localhost:8086".to_string(),
            "home".to_string(),
            "air_quality".to_string(),
            "secret".to_string(),
            Duration::from_secs(5),
        );

        let rendered = format!("{sink:?}");
        assert!(!rendered.contains("secret"));
    }
}
