//! SSML document construction.

/// Fallback `xml:lang` when the voice name carries no locale.
const DEFAULT_LOCALE: &str = "en-US";

/// Wrap `text` in an SSML document for `voice`.
///
/// Leading silence is forced to zero so consecutive queue items join up
/// without gaps; `ending_silence_ms > 0` appends a break.
pub fn build_ssml(text: &str, voice: &str, ending_silence_ms: u32) -> String {
    let mut ssml = format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' \
         xmlns:mstts='http://www.w3.org/2001/mstts' xml:lang='{lang}'>\
         <voice name='{voice}'>\
         <mstts:leadingsilence-exact value='0'/>{text}",
        lang = voice_locale(voice),
        voice = xml_escape(voice),
        text = xml_escape(text),
    );
    if ending_silence_ms > 0 {
        ssml.push_str(&format!("<break time='{ending_silence_ms}ms' />"));
    }
    ssml.push_str("</voice></speak>");
    ssml
}

/// Locale prefix of a voice name, e.g. `de-DE` for `de-DE-KatjaNeural`.
pub fn voice_locale(voice: &str) -> &str {
    let mut dashes = voice.match_indices('-').map(|(i, _)| i);
    match (dashes.next(), dashes.next()) {
        (Some(first), Some(second)) if first > 0 && second > first + 1 => &voice[..second],
        _ => DEFAULT_LOCALE,
    }
}

/// Escape the five XML special characters.
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssml_structure() {
        let ssml = build_ssml("Hello there.", "en-US-AvaMultilingualNeural", 0);
        assert!(ssml.starts_with("<speak version='1.0'"));
        assert!(ssml.contains("xml:lang='en-US'"));
        assert!(ssml.contains("<voice name='en-US-AvaMultilingualNeural'>"));
        assert!(ssml.contains("<mstts:leadingsilence-exact value='0'/>Hello there."));
        assert!(!ssml.contains("<break"));
        assert!(ssml.ends_with("</voice></speak>"));
    }

    #[test]
    fn test_ssml_ending_silence() {
        let ssml = build_ssml("Bye.", "en-US-AvaMultilingualNeural", 250);
        assert!(ssml.contains("Bye.<break time='250ms' /></voice>"));
    }

    #[test]
    fn test_ssml_escapes_text() {
        let ssml = build_ssml("Tom & Jerry <3 'quotes'", "en-US-AvaMultilingualNeural", 0);
        assert!(ssml.contains("Tom &amp; Jerry &lt;3 &#x27;quotes&#x27;"));
    }

    #[test]
    fn test_voice_locale() {
        assert_eq!(voice_locale("de-DE-KatjaNeural"), "de-DE");
        assert_eq!(voice_locale("zh-CN-XiaoxiaoNeural"), "zh-CN");
        assert_eq!(voice_locale("custom"), "en-US");
        assert_eq!(voice_locale("-x-y"), "en-US");
    }
}
