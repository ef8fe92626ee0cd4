use std::collections::HashMap;

/// Sequence-based similarity ratio in [0, 1]: twice the total length of the
/// matching blocks divided by the combined length. Callers decide case
/// handling; two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();

	if a.is_empty() && b.is_empty() {
		return 1.0;
	}

	let matched = matching_len(&a, &b);

	2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn matching_len(a: &[char], b: &[char]) -> usize {
	let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();

	for (j, ch) in b.iter().enumerate() {
		b2j.entry(*ch).or_default().push(j);
	}

	let mut total = 0;
	let mut pending = vec![(0, a.len(), 0, b.len())];

	while let Some((alo, ahi, blo, bhi)) = pending.pop() {
		let (i, j, size) = longest_match(a, &b2j, alo, ahi, blo, bhi);

		if size == 0 {
			continue;
		}

		total += size;

		pending.push((alo, i, blo, j));
		pending.push((i + size, ahi, j + size, bhi));
	}

	total
}

fn longest_match(
	a: &[char],
	b2j: &HashMap<char, Vec<usize>>,
	alo: usize,
	ahi: usize,
	blo: usize,
	bhi: usize,
) -> (usize, usize, usize) {
	let mut best_i = alo;
	let mut best_j = blo;
	let mut best_size = 0;
	// j2len[j] is the length of the match ending at (i - 1, j).
	let mut j2len: HashMap<usize, usize> = HashMap::new();

	for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
		let mut next_j2len = HashMap::new();

		if let Some(indices) = b2j.get(ch) {
			for &j in indices {
				if j < blo {
					continue;
				}
				if j >= bhi {
					break;
				}

				let size =
					j.checked_sub(1).and_then(|prev| j2len.get(&prev)).copied().unwrap_or(0) + 1;

				next_j2len.insert(j, size);

				if size > best_size {
					best_i = i + 1 - size;
					best_j = j + 1 - size;
					best_size = size;
				}
			}
		}

		j2len = next_j2len;
	}

	(best_i, best_j, best_size)
}
