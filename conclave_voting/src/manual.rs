/*!

This is the long-form manual for `conclave_voting` and `conclave`.

## The model

An election has a list of options and a population of electors. Each elector
gives a non-negative weight to each option; the weights are relative
intensities and do not need to sum to 1. At least one weight must be
positive.

- **Round 0** Every elector draws an option at random, with a probability
  proportional to its weight.
- **Round k > 0** Every elector votes for the option that maximizes
  `weight * votes of the option in round k-1`. The options are looked at in
  the order of the election and a later option must do strictly better to be
  preferred. When no option scores above zero, the first option of the
  election gets the vote.

After each round, an option that received at least `fraction_required` of
the votes wins. If several options qualify (this requires a threshold of 50%
or less), the one with the most votes wins. When `max_rounds` is reached
without such an option, the winner is the option with the most votes in the
last round. No round is voted beyond `max_rounds`.

Equal vote counts are resolved by the tie-break mode:
- `useOptionOrder` the option listed first wins
- `random` the options are ordered using a cryptographic hash of the seed,
  the round number and the name of the option. It is reproducible.

Without `max_rounds`, the election fails as soon as the tally of a round is
identical to the tally of an earlier round: since each round only depends on
the previous one, the votes are in a cycle that will never produce a winner.

## Configuration

The `conclave` program reads a configuration file in JSON:

```text
{
  "outputSettings": { "contestName": "papal conclave" },
  "options": ["A", "B", "C"],
  "electors": [
    { "name": "e1", "preferences": { "A": 3, "B": 1 } },
    { "preferences": { "B": 2, "C": 2 } }
  ],
  "electorFileSources": [
    { "provider": "csv", "filePath": "electors.csv", "nameColumnIndex": 1 }
  ],
  "rules": {
    "fractionRequired": 0.66,
    "maxRounds": 30,
    "randomSeed": "42",
    "tiebreakMode": "useOptionOrder"
  }
}
```

Electors without a name are numbered in the order in which they are added.
The electors listed in the file come first, followed by the electors of each
file source.

### csv

Elector preferences as Comma Separated Values. The first row is a header with
the names of the options. Each following row is one elector:

```text
name,A,B,C
e2,0,2,2
e3,1,1,1
```

- `nameColumnIndex` (number, optional): the column with the names of the
  electors. Without it, a first column titled `name` holds the names;
  otherwise the electors are numbered.
- `firstWeightColumnIndex` (number, optional): the first column with weights.
  Defaults to the column after the name column, or the first column.

Indexes start at 1. Empty cells are a weight of zero.

## Output

The summary of an election is written in JSON:

```text
{
  "config": { "contest": "...", "electors": 3, "fractionRequired": 0.66, "maxRounds": 30, "seed": 42 },
  "outcome": { "winner": "B", "decidedBy": "majority", "rounds": 3 },
  "results": [ { "round": 0, "tally": { "A": "1", "B": "2", "C": "0" } }, ... ]
}
```

With `--trials N`, `N` elections are run with the seeds `seed`, `seed + 1`,
..., and the summary lists how many times each option won.

 */
