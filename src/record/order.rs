use std::cmp::Ordering;

/// Version-aware string comparison: runs of digits compare by numeric value, so
/// `"chr2" < "chr10"`. Equal numbers with more leading zeros sort after.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let a_run = digit_run(&a[i..]);
            let b_run = digit_run(&b[j..]);
            match numeric_cmp(a_run, b_run) {
                Ordering::Equal => {
                    i += a_run.len();
                    j += b_run.len();
                }
                ord => return ord,
            }
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            }
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run(bytes: &[u8]) -> &[u8] {
    let len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    &bytes[..len]
}

// compares without converting, so runs longer than a u64 still work
fn numeric_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let strip = |run: &[u8]| -> usize { run.iter().take_while(|&&d| d == b'0').count() };
    let (a_digits, b_digits) = (&a[strip(a)..], &b[strip(b)..]);
    a_digits
        .len()
        .cmp(&b_digits.len())
        .then_with(|| a_digits.cmp(b_digits))
        .then_with(|| a.len().cmp(&b.len()))
}
