//! Metric line records and their decoder.

mod decode;
mod types;

pub use self::decode::decode_line;
pub use self::types::{
    MessageType, MetricId, MetricMessage, MetricName, MetricValue, NoitField, StatusFields,
    ValueType,
};

pub(crate) use self::decode::parse_i64_prefix;

#[cfg(test)]
mod tests {
    use super::*;

    const H_LINE: &str = "H1\t1525385460.000\tpush`httptrap`c_933_247631::httptrap`43e5c324-44c2-4877-a625-3b4c8230f2eb\tSuperSimpleMetricName|ST[a:b,c:d]\tAAUK/wACDP8AARH/AAEa/wABVP8AAQ==";

    #[test]
    fn test_implicit_tags() {
        let msg = decode_line(H_LINE.as_bytes(), NoitField::Auto).unwrap();
        let implicit = msg.implicit_tags();
        assert_eq!(
            implicit.canonical(),
            "__check_uuid:43e5c324-44c2-4877-a625-3b4c8230f2eb,__name:SuperSimpleMetricName"
        );
    }

    #[test]
    fn test_status_fields() {
        let line = "S\t1525385460.000\tping`icmp`c_1_2`43e5c324-44c2-4877-a625-3b4c8230f2eb\tG\tA\t12\tall good";
        let msg = decode_line(line.as_bytes(), NoitField::Auto).unwrap();
        assert_eq!(msg.kind, MessageType::Status);
        assert!(msg.id.name.is_none());
        let status = msg.status().unwrap();
        assert_eq!(status.state, "G");
        assert_eq!(status.available, Some("A"));
        assert_eq!(status.duration, Some(12));
        assert_eq!(status.status, Some("all good"));
    }

    #[test]
    fn test_json_rendering() {
        let line = "M\t127.0.0.1\t1526493506.214\tunknown`fault`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tfoo|ST[color:orange]\ti\t100";
        let msg = decode_line(line.as_bytes(), NoitField::Auto).unwrap();
        let json: serde_json::Value = serde_json::from_str(&msg.to_json(false)).unwrap();
        assert_eq!(json["type"], "M");
        assert_eq!(json["timestamp_ms"], 1_526_493_506_214u64);
        assert_eq!(json["check_uuid"], "4766c496-2173-4f60-9607-6449d29cac56");
        assert_eq!(json["value_type"], "i");
        assert_eq!(json["account_id"], 1);
        assert_eq!(json["foo|ST[color:orange]"], 100);
        assert!(json.get("original").is_none());

        let json: serde_json::Value = serde_json::from_str(&msg.to_json(true)).unwrap();
        assert_eq!(json["original"], line);
    }

    #[test]
    fn test_json_null_and_histogram() {
        let line = "M\t1526493506.214\tx`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tfoo\tn\t[[null]]";
        let msg = decode_line(line.as_bytes(), NoitField::Auto).unwrap();
        let json: serde_json::Value = serde_json::from_str(&msg.to_json(false)).unwrap();
        assert!(json["value_type"].is_null());
        assert!(json["foo"].is_null());

        let msg = decode_line(H_LINE.as_bytes(), NoitField::Auto).unwrap();
        let json: serde_json::Value = serde_json::from_str(&msg.to_json(false)).unwrap();
        assert_eq!(json["histogram"], "AAUK/wACDP8AARH/AAEa/wABVP8AAQ==");
    }

    #[test]
    fn test_into_owned_outlives_line() {
        let owned = {
            let line = H_LINE.to_string();
            decode_line(line.as_bytes(), NoitField::Auto)
                .unwrap()
                .into_owned()
        };
        assert_eq!(owned.metric_name(), Some("SuperSimpleMetricName|ST[a:b,c:d]"));
    }
}
